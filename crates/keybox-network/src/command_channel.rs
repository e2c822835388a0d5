//! Inbound command channel.
//!
//! The backend's command broker pushes newline-terminated text messages such
//! as `open 3` or `tamper_alarm on` over a plain TCP connection. The device
//! polls the channel on a fixed cadence; each poll waits a bounded time for
//! traffic and returns whatever arrived. A lost connection is dropped and
//! re-established on the next poll.
//!
//! ```no_run
//! use keybox_network::{CommandChannel, CommandChannelConfig, CommandSource};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut channel = CommandChannel::new(CommandChannelConfig {
//!     broker_addr: "10.0.0.2:1884".to_string(),
//!     timeout: Duration::from_millis(1500),
//! });
//!
//! for message in channel.poll_commands().await? {
//!     println!("received {message}");
//! }
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

use crate::error::{Result, TransportError};
use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// Longest message accepted from the broker.
const MAX_LINE_LENGTH: usize = 256;

/// Source of raw remote command messages.
pub trait CommandSource: Send {
    /// Return every message received since the last poll.
    ///
    /// Waits at most the source's configured timeout.
    async fn poll_commands(&mut self) -> Result<Vec<String>>;
}

/// Configuration for [`CommandChannel`].
#[derive(Debug, Clone)]
pub struct CommandChannelConfig {
    /// `host:port` of the command broker.
    pub broker_addr: String,

    /// Bound on connecting and on each poll.
    pub timeout: Duration,
}

/// Line-framed TCP connection to the command broker.
pub struct CommandChannel {
    config: CommandChannelConfig,
    framed: Option<Framed<TcpStream, LinesCodec>>,
}

impl CommandChannel {
    /// Create an unconnected channel. The first poll connects.
    pub fn new(config: CommandChannelConfig) -> Self {
        Self {
            config,
            framed: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Connect to the broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or times out.
    pub async fn connect(&mut self) -> Result<()> {
        info!("Connecting to command broker at {}", self.config.broker_addr);

        let stream = match tokio::time::timeout(
            self.config.timeout,
            TcpStream::connect(&self.config.broker_addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(TransportError::timeout(self.config.timeout)),
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(
            stream,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        ));
        debug!("Command channel connected");
        Ok(())
    }

    /// Drop the connection. The next poll reconnects.
    pub fn disconnect(&mut self) {
        if self.framed.take().is_some() {
            debug!("Command channel disconnected");
        }
    }

    async fn receive(&mut self) -> Result<Vec<String>> {
        let timeout = self.config.timeout;
        let framed = self.framed.as_mut().ok_or(TransportError::NotConnected)?;
        let mut messages = Vec::new();

        // Wait for the first line, then take whatever else is already buffered.
        let mut wait = timeout;
        loop {
            match tokio::time::timeout(wait, framed.next()).await {
                Ok(Some(Ok(line))) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        messages.push(line);
                    }
                    wait = Duration::ZERO;
                }
                Ok(Some(Err(e))) => {
                    return Err(TransportError::ConnectionLost(e.to_string()));
                }
                Ok(None) => {
                    return Err(TransportError::ConnectionLost(
                        "Broker closed connection".to_string(),
                    ));
                }
                Err(_) => return Ok(messages),
            }
        }
    }
}

impl CommandSource for CommandChannel {
    async fn poll_commands(&mut self) -> Result<Vec<String>> {
        if !self.is_connected() {
            self.connect().await?;
        }

        match self.receive().await {
            Ok(messages) => Ok(messages),
            Err(e) => {
                self.disconnect();
                Err(e)
            }
        }
    }
}

/// In-memory command source for tests and the simulator.
#[derive(Debug, Default)]
pub struct QueuedCommands {
    pending: VecDeque<String>,
    fail_next: bool,
}

impl QueuedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for the next poll.
    pub fn push(&mut self, message: impl Into<String>) {
        self.pending.push_back(message.into());
    }

    /// Make the next poll fail with a lost connection.
    pub fn fail_next_poll(&mut self) {
        self.fail_next = true;
    }
}

impl CommandSource for QueuedCommands {
    async fn poll_commands(&mut self) -> Result<Vec<String>> {
        if std::mem::take(&mut self.fail_next) {
            return Err(TransportError::ConnectionLost("simulated".to_string()));
        }
        Ok(self.pending.drain(..).collect())
    }
}
