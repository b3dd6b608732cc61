//! Order snapshot types.
//!
//! Snapshots are produced by the order storage service and only ever read
//! here. Each one carries the timestamp used for apply-if-newer ordering.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use crate::error::SdkError;

/// Order lifecycle status.
///
/// `Completed` and `Cancelled` are owned and validated by the order storage
/// service; they are carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order received, not yet started.
    Pending,
    /// Kitchen is preparing the order.
    Preparing,
    /// Order is ready for pickup or serving.
    Ready,
    /// Order was served and closed.
    Completed,
    /// Order was cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns the status as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(SdkError::InvalidStatus(other.to_string())),
        }
    }
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Menu item name.
    pub name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Free-form kitchen notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Unit price in cents, if the producer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_cents: Option<u64>,
}

impl LineItem {
    /// Creates a line item.
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
            notes: None,
            unit_price_cents: None,
        }
    }

    /// Sets the kitchen notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the unit price.
    #[must_use]
    pub const fn with_unit_price_cents(mut self, cents: u64) -> Self {
        self.unit_price_cents = Some(cents);
        self
    }
}

/// Point-in-time state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    /// Order identifier.
    pub id: String,

    /// Restaurant the order belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,

    /// Table (session) the order was placed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,

    /// Lifecycle status.
    pub status: OrderStatus,

    /// Ordered items.
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// Snapshot timestamp, used for apply-if-newer ordering.
    pub timestamp: DateTime<Utc>,
}

impl OrderSnapshot {
    /// Creates a pending snapshot stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            restaurant_id: None,
            table_id: None,
            status: OrderStatus::Pending,
            items: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Sets the restaurant identifier.
    #[must_use]
    pub fn with_restaurant(mut self, restaurant_id: impl Into<String>) -> Self {
        self.restaurant_id = Some(restaurant_id.into());
        self
    }

    /// Sets the table identifier.
    #[must_use]
    pub fn with_table(mut self, table_id: impl Into<String>) -> Self {
        self.table_id = Some(table_id.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds a line item.
    #[must_use]
    pub fn with_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the table channel, if the snapshot names a valid table.
    #[must_use]
    pub fn table_channel(&self) -> Option<Channel> {
        self.table_id.as_deref().and_then(Channel::for_table)
    }

    /// Returns the restaurant channel, if the snapshot names a restaurant.
    #[must_use]
    pub fn restaurant_channel(&self) -> Option<Channel> {
        self.restaurant_id
            .as_deref()
            .and_then(Channel::for_restaurant)
    }

    /// Returns true if this snapshot is at least as new as `other`.
    #[must_use]
    pub fn is_not_older_than(&self, other: &Self) -> bool {
        self.timestamp >= other.timestamp
    }

    /// Returns the total number of items ordered.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_status_from_str() {
        assert_eq!("preparing".parse::<OrderStatus>(), Ok(OrderStatus::Preparing));
        assert!("served".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_terminal() {
        assert!(!OrderStatus::Ready.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_snapshot_channels() {
        let snapshot = OrderSnapshot::new("42").with_table("7").with_restaurant("3");
        assert_eq!(
            snapshot.table_channel(),
            Some(Channel::Session("7".to_string()))
        );
        assert_eq!(
            snapshot.restaurant_channel(),
            Some(Channel::Restaurant("3".to_string()))
        );
    }

    #[test]
    fn test_snapshot_without_scope() {
        let snapshot = OrderSnapshot::new("42");
        assert!(snapshot.table_channel().is_none());
        assert!(snapshot.restaurant_channel().is_none());
    }

    #[test]
    fn test_snapshot_wire_format() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("ts");
        let snapshot = OrderSnapshot::new("42")
            .with_table("7")
            .with_restaurant("3")
            .with_item(LineItem::new("Ramen", 2).with_notes("no scallions"))
            .with_timestamp(timestamp);

        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["id"], "42");
        assert_eq!(json["tableId"], "7");
        assert_eq!(json["restaurantId"], "3");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["items"][0]["notes"], "no scallions");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_snapshot_deserialize_minimal() {
        let json = r#"{"id":"9","status":"ready","timestamp":"2024-05-01T12:00:00Z"}"#;
        let snapshot: OrderSnapshot = serde_json::from_str(json).expect("deserialize");
        assert_eq!(snapshot.status, OrderStatus::Ready);
        assert!(snapshot.items.is_empty());
        assert!(snapshot.table_id.is_none());
    }

    #[test]
    fn test_snapshot_item_count() {
        let snapshot = OrderSnapshot::new("1")
            .with_item(LineItem::new("Tea", 2))
            .with_item(LineItem::new("Bun", 3).with_unit_price_cents(250));
        assert_eq!(snapshot.item_count(), 5);
    }
}
