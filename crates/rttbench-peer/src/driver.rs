//! Sequential round-trip state machine.
//!
//! The driver owns no socket and reads no clock: connection events and
//! their timestamps are fed into [`Driver::handle`], which answers with the
//! actions the caller must perform. Exactly one request is in flight at a
//! time because the next send is only ever produced by an echo event.
//!
//! The caller reports [`DriverEvent::Sent`] immediately before writing each
//! request, so an RTT covers only the write and the wait for its echo.

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use rttbench_frame::{encode_frame, FrameError};

use crate::config::RunConfig;

/// Lifecycle of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing has happened yet.
    Idle,
    /// A connection attempt is under way.
    Connecting,
    /// A request is on the wire and its echo has not arrived.
    AwaitingEcho,
    /// The run is over, complete or not.
    Finished,
}

/// Something that happened on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// The caller started connecting.
    Connect,
    /// The connection is established.
    Connected,
    /// The pending request is about to be written.
    Sent { at: Instant },
    /// A complete echo frame was decoded.
    EchoReceived { at: Instant },
    /// The connection ended, cleanly or not.
    Closed,
}

/// What the caller has to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write this already-encoded frame.
    Send(Bytes),
    /// Keep this sample for the report.
    RecordSample(Sample),
    /// Close the connection; the run is complete.
    Close,
    /// Nothing to do.
    None,
}

/// One measured round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// 1-based send sequence number.
    pub seq: u64,
    /// Round-trip time.
    pub rtt: Duration,
}

impl Sample {
    /// Round-trip time in microseconds.
    pub fn micros(&self) -> f64 {
        self.rtt.as_nanos() as f64 / 1_000.0
    }
}

/// Sequential RTT driver.
#[derive(Debug)]
pub struct Driver {
    frame: Bytes,
    total: u64,
    warmup: u64,
    sent: u64,
    received: u64,
    sent_at: Option<Instant>,
    state: DriverState,
}

impl Driver {
    /// Build a driver that sends `message` `total` times, discarding the
    /// samples of the first `warmup` sends.
    pub fn new(message: &[u8], total: u64, warmup: u64) -> Result<Self, FrameError> {
        let mut wire = BytesMut::new();
        encode_frame(message, &mut wire)?;
        Ok(Self {
            frame: wire.freeze(),
            total,
            warmup,
            sent: 0,
            received: 0,
            sent_at: None,
            state: DriverState::Idle,
        })
    }

    /// Build a driver from a run configuration.
    pub fn from_config(config: &RunConfig) -> Result<Self, FrameError> {
        Self::new(
            config.message.as_bytes(),
            config.count,
            config.effective_warmup(),
        )
    }

    /// Apply one event and return the resulting actions, in order.
    pub fn handle(&mut self, event: DriverEvent) -> Vec<Action> {
        match (self.state, event) {
            (DriverState::Idle, DriverEvent::Connect) => {
                self.state = DriverState::Connecting;
                vec![Action::None]
            }
            (DriverState::Idle | DriverState::Connecting, DriverEvent::Connected) => {
                if self.total == 0 {
                    self.state = DriverState::Finished;
                    return vec![Action::Close];
                }
                vec![self.send_next()]
            }
            (DriverState::AwaitingEcho, DriverEvent::Sent { at }) if self.sent_at.is_none() => {
                self.sent_at = Some(at);
                vec![Action::None]
            }
            (DriverState::AwaitingEcho, DriverEvent::EchoReceived { at }) => self.on_echo(at),
            (DriverState::Finished, DriverEvent::Closed) => vec![Action::None],
            (_, DriverEvent::Closed) => {
                tracing::debug!(
                    sent = self.sent,
                    received = self.received,
                    total = self.total,
                    "connection closed before run completed"
                );
                self.state = DriverState::Finished;
                self.sent_at = None;
                vec![Action::None]
            }
            (state, event) => {
                tracing::warn!(?state, ?event, "ignoring unexpected driver event");
                vec![Action::None]
            }
        }
    }

    fn on_echo(&mut self, at: Instant) -> Vec<Action> {
        let rtt = match self.sent_at.take() {
            Some(started) => at.saturating_duration_since(started),
            None => {
                tracing::warn!(seq = self.sent, "echo arrived for a request never marked sent");
                Duration::ZERO
            }
        };
        self.received += 1;

        let mut actions = Vec::with_capacity(2);
        if self.sent > self.warmup {
            actions.push(Action::RecordSample(Sample {
                seq: self.sent,
                rtt,
            }));
        }

        if self.sent < self.total {
            actions.push(self.send_next());
        } else {
            self.state = DriverState::Finished;
            actions.push(Action::Close);
        }
        actions
    }

    fn send_next(&mut self) -> Action {
        self.sent += 1;
        self.sent_at = None;
        self.state = DriverState::AwaitingEcho;
        Action::Send(self.frame.clone())
    }

    /// Current state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Requests sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Echoes received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Requests this run will send in total.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The encoded request frame.
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    /// Whether every request got its echo.
    pub fn is_complete(&self) -> bool {
        self.state == DriverState::Finished && self.received == self.total
    }
}
