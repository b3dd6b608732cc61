//! Single-target reconnecting link.
//!
//! Each link owns one subscription target and one background task. The task
//! drives an explicit four-state machine:
//!
//! ```text
//!   Idle --target--> Connecting --open--> Connected
//!                      ^    |                 |
//!                      |  fail              drop/error
//!                      |    v                 v
//!                      +-- Backoff(n) <-------+
//! ```
//!
//! The backoff timer only exists while the machine is in `Backoff`, so a
//! target change or a successful open cancels it by construction, and two
//! pending timers cannot exist.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::backoff::BackoffPolicy;
use super::client::Inbound;
use super::config::WsConfig;
use super::error::WsError;
use super::messages::ClientMessage;
use crate::types::Channel;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How long a graceful close may take before the socket is simply dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No target, or the link was closed.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open.
    Connected,
    /// Waiting before retry number `attempt`.
    Backoff {
        /// Zero-based retry attempt.
        attempt: u32,
    },
}

impl LinkState {
    /// Returns true if the socket is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Transition rules of the link, free of any I/O.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: LinkState,
    /// Attempt being retried while `Connecting` after a backoff.
    retrying: Option<u32>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Creates an idle machine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: LinkState::Idle,
            retrying: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// A new target was set: start a fresh attempt.
    pub fn target_changed(&mut self) -> LinkState {
        self.retrying = None;
        self.state = LinkState::Connecting;
        self.state
    }

    /// The socket opened.
    pub fn opened(&mut self) -> LinkState {
        self.retrying = None;
        self.state = LinkState::Connected;
        self.state
    }

    /// The socket failed or an attempt failed. Returns the backoff attempt.
    pub fn failed(&mut self) -> u32 {
        let attempt = match self.state {
            LinkState::Connecting => self.retrying.map_or(0, |n| n.saturating_add(1)),
            LinkState::Backoff { attempt } => attempt,
            LinkState::Connected | LinkState::Idle => 0,
        };
        self.retrying = None;
        self.state = LinkState::Backoff { attempt };
        attempt
    }

    /// The backoff timer fired.
    pub fn backoff_elapsed(&mut self) -> LinkState {
        if let LinkState::Backoff { attempt } = self.state {
            self.retrying = Some(attempt);
            self.state = LinkState::Connecting;
        }
        self.state
    }

    /// The link was closed or gave up.
    pub fn closed(&mut self) -> LinkState {
        self.retrying = None;
        self.state = LinkState::Idle;
        self.state
    }
}

/// Commands accepted by a link task.
#[derive(Debug)]
pub(crate) enum LinkCommand {
    /// Switch to a new target.
    Retarget(Channel),
    /// Send a text frame if connected.
    Send(String),
    /// Close and stay idle.
    Close,
}

/// Handle to a running link task. Dropping it stops the task.
#[derive(Debug)]
pub(crate) struct LinkHandle {
    target: Channel,
    commands: mpsc::UnboundedSender<LinkCommand>,
    state: watch::Receiver<LinkState>,
}

impl LinkHandle {
    /// Spawns a link task subscribed to `target`.
    pub(crate) fn spawn(
        label: &'static str,
        target: Channel,
        config: &WsConfig,
        inbound: Arc<Inbound>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(LinkState::Idle);

        let task = LinkTask {
            label,
            config: config.clone(),
            policy: BackoffPolicy::from_config(config),
            machine: StateMachine::new(),
            target: None,
            commands: command_rx,
            state_tx,
            inbound,
        };
        tokio::spawn(task.run());

        let handle = Self {
            target: target.clone(),
            commands,
            state,
        };
        handle.command(LinkCommand::Retarget(target));
        handle
    }

    /// Returns the desired target.
    pub(crate) const fn target(&self) -> &Channel {
        &self.target
    }

    /// Points the link at a new target.
    pub(crate) fn retarget(&mut self, target: Channel) {
        if self.target == target {
            return;
        }
        self.target = target.clone();
        self.command(LinkCommand::Retarget(target));
    }

    /// Queues a text frame.
    pub(crate) fn send(&self, text: String) {
        self.command(LinkCommand::Send(text));
    }

    /// Asks the task to close the socket.
    pub(crate) fn close(&self) {
        self.command(LinkCommand::Close);
    }

    /// Returns the current state.
    pub(crate) fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state changes.
    pub(crate) fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    fn command(&self, command: LinkCommand) {
        if self.commands.send(command).is_err() {
            debug!(channel = %self.target, "link task already stopped");
        }
    }
}

/// What ended a connected session.
enum SessionEnd {
    /// Keep running the state machine.
    Continue,
    /// The handle was dropped; exit the task.
    Shutdown,
}

struct LinkTask {
    label: &'static str,
    config: WsConfig,
    policy: BackoffPolicy,
    machine: StateMachine,
    target: Option<Channel>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    state_tx: watch::Sender<LinkState>,
    inbound: Arc<Inbound>,
}

impl LinkTask {
    async fn run(mut self) {
        loop {
            let keep_running = match self.machine.state() {
                LinkState::Idle => self.idle().await,
                LinkState::Connecting | LinkState::Connected => self.connect().await,
                LinkState::Backoff { attempt } => self.backoff(attempt).await,
            };
            if !keep_running {
                break;
            }
        }
        debug!(link = self.label, "link task stopped");
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.machine.state());
    }

    fn set_target(&mut self, target: Channel) {
        debug!(link = self.label, channel = %target, "target changed");
        self.target = Some(target);
        self.machine.target_changed();
        self.publish();
    }

    fn fail(&mut self, error: &WsError) {
        let attempt = self.machine.failed();
        if self.policy.should_retry(attempt) {
            warn!(link = self.label, attempt, %error, "link down, backing off");
        } else {
            warn!(link = self.label, attempt, %error, "giving up reconnecting");
            self.machine.closed();
        }
        self.publish();
    }

    /// Handles a command outside of a connected session.
    /// Returns false when the handle is gone.
    fn handle_offline_command(&mut self, command: Option<LinkCommand>) -> bool {
        match command {
            Some(LinkCommand::Retarget(target)) => self.set_target(target),
            Some(LinkCommand::Send(_)) => {
                debug!(link = self.label, "not connected, message dropped");
            }
            Some(LinkCommand::Close) => {
                self.machine.closed();
                self.publish();
            }
            None => return false,
        }
        true
    }

    async fn idle(&mut self) -> bool {
        let command = self.commands.recv().await;
        self.handle_offline_command(command)
    }

    async fn backoff(&mut self, attempt: u32) -> bool {
        let delay = self.policy.delay(attempt);
        debug!(link = self.label, attempt, ?delay, "reconnect scheduled");
        let timer = time::sleep(delay);
        tokio::pin!(timer);

        tokio::select! {
            () = &mut timer => {
                self.machine.backoff_elapsed();
                self.publish();
                true
            }
            command = self.commands.recv() => self.handle_offline_command(command),
        }
    }

    async fn connect(&mut self) -> bool {
        let Some(target) = self.target.clone() else {
            self.machine.closed();
            self.publish();
            return true;
        };

        let url = match self.config.connection_url(&target.to_string()) {
            Ok(url) => url,
            Err(e) => {
                self.fail(&e);
                return true;
            }
        };
        debug!(link = self.label, %url, "connecting");
        let attempt = time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(url),
        );
        tokio::pin!(attempt);

        let stream = loop {
            tokio::select! {
                result = &mut attempt => match result {
                    Ok(Ok((stream, _response))) => break stream,
                    Ok(Err(e)) => {
                        self.fail(&WsError::from(e));
                        return true;
                    }
                    Err(_elapsed) => {
                        self.fail(&WsError::Timeout);
                        return true;
                    }
                },
                command = self.commands.recv() => match command {
                    // Dropping the in-flight attempt keeps a single attempt per link.
                    Some(LinkCommand::Retarget(target)) => {
                        self.set_target(target);
                        return true;
                    }
                    Some(LinkCommand::Send(_)) => {
                        debug!(link = self.label, "still connecting, message dropped");
                    }
                    Some(LinkCommand::Close) => {
                        self.machine.closed();
                        self.publish();
                        return true;
                    }
                    None => return false,
                },
            }
        };

        self.machine.opened();
        self.publish();
        info!(link = self.label, channel = %target, "connected");

        matches!(self.session(stream).await, SessionEnd::Continue)
    }

    async fn session(&mut self, stream: WsStream) -> SessionEnd {
        let (mut sink, mut source) = stream.split();
        let period = self.config.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.inbound.handle_text(text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        self.fail(&WsError::ServerClosed);
                        return SessionEnd::Continue;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.fail(&WsError::from(e));
                        return SessionEnd::Continue;
                    }
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = send_json(&mut sink, &ClientMessage::ping()).await {
                        self.fail(&e);
                        return SessionEnd::Continue;
                    }
                }
                command = self.commands.recv() => match command {
                    Some(LinkCommand::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            self.fail(&WsError::from(e));
                            return SessionEnd::Continue;
                        }
                    }
                    Some(LinkCommand::Retarget(target)) => {
                        // Detach the reader before closing so the close frame
                        // cannot be observed as an unexpected drop.
                        drop(source);
                        close_quietly(sink).await;
                        self.set_target(target);
                        return SessionEnd::Continue;
                    }
                    Some(LinkCommand::Close) => {
                        drop(source);
                        close_quietly(sink).await;
                        self.machine.closed();
                        self.publish();
                        info!(link = self.label, "closed");
                        return SessionEnd::Continue;
                    }
                    None => {
                        drop(source);
                        close_quietly(sink).await;
                        return SessionEnd::Shutdown;
                    }
                },
            }
        }
    }
}

async fn send_json(sink: &mut WsSink, message: &ClientMessage) -> Result<(), WsError> {
    let json = serde_json::to_string(message)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn close_quietly(mut sink: WsSink) {
    let _ = time::timeout(CLOSE_TIMEOUT, sink.close()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_starts_idle() {
        let machine = StateMachine::new();
        assert_eq!(machine.state(), LinkState::Idle);
        assert!(!machine.state().is_connected());
    }

    #[test]
    fn test_open_after_target() {
        let mut machine = StateMachine::new();
        assert_eq!(machine.target_changed(), LinkState::Connecting);
        assert_eq!(machine.opened(), LinkState::Connected);
        assert!(machine.state().is_connected());
    }

    #[test]
    fn test_drop_while_connected_backs_off_from_zero() {
        let mut machine = StateMachine::new();
        machine.target_changed();
        machine.opened();

        assert_eq!(machine.failed(), 0);
        assert_eq!(machine.state(), LinkState::Backoff { attempt: 0 });
    }

    #[test]
    fn test_failed_retries_increment_attempt() {
        let mut machine = StateMachine::new();
        machine.target_changed();
        machine.opened();
        machine.failed();

        for expected in 1..5 {
            assert_eq!(machine.backoff_elapsed(), LinkState::Connecting);
            assert_eq!(machine.failed(), expected);
        }
    }

    #[test]
    fn test_success_resets_attempt() {
        let mut machine = StateMachine::new();
        machine.target_changed();
        machine.failed();
        machine.backoff_elapsed();
        machine.failed();
        machine.backoff_elapsed();
        machine.opened();

        assert_eq!(machine.failed(), 0);
    }

    #[test]
    fn test_first_attempt_failure_backs_off_from_zero() {
        let mut machine = StateMachine::new();
        machine.target_changed();
        assert_eq!(machine.failed(), 0);
    }

    #[test]
    fn test_target_change_cancels_backoff() {
        let mut machine = StateMachine::new();
        machine.target_changed();
        machine.opened();
        machine.failed();
        machine.backoff_elapsed();
        machine.failed();

        assert_eq!(machine.target_changed(), LinkState::Connecting);
        // The retry counter is gone: the next failure starts over.
        assert_eq!(machine.failed(), 0);
    }

    #[test]
    fn test_backoff_elapsed_only_from_backoff() {
        let mut machine = StateMachine::new();
        assert_eq!(machine.backoff_elapsed(), LinkState::Idle);
        machine.target_changed();
        machine.opened();
        assert_eq!(machine.backoff_elapsed(), LinkState::Connected);
    }

    #[test]
    fn test_close_returns_to_idle() {
        let mut machine = StateMachine::new();
        machine.target_changed();
        machine.opened();
        assert_eq!(machine.closed(), LinkState::Idle);
    }
}
