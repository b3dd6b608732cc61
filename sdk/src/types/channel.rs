//! Channel names for order event subscriptions.
//!
//! A channel is a string key. Three kinds exist by convention:
//!
//! - session channels, named after a table or session identifier (`"7"`)
//! - the kitchen channel, a single well-known name (`"kitchen"`)
//! - restaurant channels, `"restaurant-<id>"`

use std::fmt;
use std::str::FromStr;

use crate::error::SdkError;

/// Name of the global kitchen channel.
pub const KITCHEN_CHANNEL: &str = "kitchen";

/// Prefix of restaurant-scoped channel names.
pub const RESTAURANT_PREFIX: &str = "restaurant-";

/// Maximum length of a channel name in bytes.
pub const MAX_CHANNEL_LEN: usize = 128;

/// Subscription scope for order events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Customer session channel, usually a table identifier.
    Session(String),

    /// Kitchen and staff dashboard channel.
    Kitchen,

    /// Restaurant-scoped admin channel.
    Restaurant(String),
}

impl Channel {
    /// Parses a channel name.
    ///
    /// Returns None if the name is empty, too long, contains control
    /// characters, or is a restaurant channel without an identifier.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_CHANNEL_LEN {
            return None;
        }
        if name.chars().any(char::is_control) {
            return None;
        }

        if name == KITCHEN_CHANNEL {
            return Some(Self::Kitchen);
        }

        match name.strip_prefix(RESTAURANT_PREFIX) {
            Some("") => None,
            Some(id) => Some(Self::Restaurant(id.to_string())),
            None => Some(Self::Session(name.to_string())),
        }
    }

    /// Returns the kitchen channel.
    #[must_use]
    pub const fn kitchen() -> Self {
        Self::Kitchen
    }

    /// Returns the channel for a table identifier.
    #[must_use]
    pub fn for_table(table_id: &str) -> Option<Self> {
        Self::parse(table_id)
    }

    /// Returns the channel for a restaurant identifier.
    #[must_use]
    pub fn for_restaurant(restaurant_id: &str) -> Option<Self> {
        let id = restaurant_id.trim();
        if id.is_empty() {
            return None;
        }
        Self::parse(&format!("{RESTAURANT_PREFIX}{id}"))
    }

    /// Returns true if this is the kitchen channel.
    #[must_use]
    pub const fn is_kitchen(&self) -> bool {
        matches!(self, Self::Kitchen)
    }

    /// Returns the channel kind as a string.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Kitchen => "kitchen",
            Self::Restaurant(_) => "restaurant",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "{}", id),
            Self::Kitchen => write!(f, "{}", KITCHEN_CHANNEL),
            Self::Restaurant(id) => write!(f, "{}{}", RESTAURANT_PREFIX, id),
        }
    }
}

impl FromStr for Channel {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| SdkError::InvalidChannel(s.to_string()))
    }
}
