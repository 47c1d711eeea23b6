use crate::config::LinkConfig;
use crate::messages::{IncomingMessage, OutgoingMessage};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rosc::{decoder::decode_udp, encoder, OscMessage, OscPacket};
use serde::Serialize;
use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, error, info, warn};

// A common buffer size for OSC over UDP
const OSC_BUF_SIZE: usize = 1536;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode OSC packet: {0}")]
    Decode(String),

    #[error("no handler for OSC address {0}")]
    UnknownAddress(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("link is not open")]
    Closed,
}

impl LinkError {
    /// Transport failures end the current drain; a single bad message does not.
    pub fn is_transport(&self) -> bool {
        matches!(self, LinkError::Io(_) | LinkError::Closed)
    }
}

/// Outcome of one non-blocking receive.
#[derive(Debug)]
pub enum PollResult {
    Empty,
    Delivered(IncomingMessage),
    Error(LinkError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub send_errors: u64,
    pub poll_errors: u64,
    pub last_sent: Option<DateTime<Utc>>,
    pub last_received: Option<DateTime<Utc>>,
}

/// Bidirectional, best-effort message channel to the grid device.
///
/// Sends never fail from the caller's point of view: a lost LED update is
/// repaired by the next refresh. `poll` must return immediately.
pub trait GridLink {
    fn open(&mut self) -> Result<()>;
    fn send(&mut self, message: &OutgoingMessage);
    fn poll(&mut self) -> PollResult;
    fn shutdown(&mut self);

    fn stats(&self) -> LinkStats {
        LinkStats::default()
    }
}

/// OSC over a pair of UDP endpoints.
pub struct OscLink {
    config: LinkConfig,
    prefix: String,
    socket: Option<UdpSocket>,
    opened: bool,
    pending: VecDeque<OscMessage>,
    stats: LinkStats,
}

impl OscLink {
    pub fn new(config: LinkConfig, prefix: impl Into<String>) -> Self {
        Self {
            config,
            prefix: prefix.into(),
            socket: None,
            opened: false,
            pending: VecDeque::new(),
            stats: LinkStats::default(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn receive(&mut self) -> Result<Option<OscMessage>, LinkError> {
        let socket = self.socket.as_ref().ok_or(LinkError::Closed)?;
        let mut buf = [0u8; OSC_BUF_SIZE];

        let size = match socket.recv_from(&mut buf) {
            Ok((size, _src_addr)) => size,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let (_remaining_buf, packet) =
            decode_udp(&buf[..size]).map_err(|e| LinkError::Decode(e.to_string()))?;
        flatten_packet(packet, &mut self.pending);
        Ok(self.pending.pop_front())
    }
}

fn flatten_packet(packet: OscPacket, out: &mut VecDeque<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push_back(msg),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten_packet(inner, out);
            }
        }
    }
}

impl GridLink for OscLink {
    fn open(&mut self) -> Result<()> {
        if self.opened {
            return Err(anyhow!("OSC link to {} was already opened", self.config.device));
        }

        let socket = UdpSocket::bind(self.config.listen)
            .with_context(|| format!("failed to bind OSC listener on {}", self.config.listen))?;
        socket
            .set_nonblocking(true)
            .context("failed to make OSC socket non-blocking")?;

        info!(
            "OSC link listening on {}, sending to {}",
            socket.local_addr().unwrap_or(self.config.listen),
            self.config.device
        );
        self.socket = Some(socket);
        self.opened = true;
        Ok(())
    }

    fn send(&mut self, message: &OutgoingMessage) {
        let Some(socket) = self.socket.as_ref() else {
            debug!("Dropping {:?}, link is closed", message);
            return;
        };

        let packet = message.to_packet(&self.prefix);
        match encoder::encode(&packet) {
            Ok(encoded_msg) => match socket.send_to(&encoded_msg, self.config.device) {
                Ok(_) => {
                    self.stats.messages_sent += 1;
                    self.stats.last_sent = Some(Utc::now());
                }
                Err(e) => {
                    self.stats.send_errors += 1;
                    warn!("Failed to send OSC message to {}: {}", self.config.device, e);
                }
            },
            Err(e) => error!("Failed to encode OSC message {:?}: {}", message, e),
        }
    }

    fn poll(&mut self) -> PollResult {
        let message = match self.pending.pop_front() {
            Some(msg) => msg,
            None => match self.receive() {
                Ok(Some(msg)) => msg,
                Ok(None) => return PollResult::Empty,
                Err(e) => {
                    self.stats.poll_errors += 1;
                    return PollResult::Error(e);
                }
            },
        };

        match IncomingMessage::from_osc(&message, &self.prefix) {
            Ok(incoming) => {
                self.stats.messages_received += 1;
                self.stats.last_received = Some(Utc::now());
                PollResult::Delivered(incoming)
            }
            Err(e) => {
                self.stats.poll_errors += 1;
                PollResult::Error(e)
            }
        }
    }

    fn shutdown(&mut self) {
        if self.socket.take().is_some() {
            info!("OSC link to {} shut down", self.config.device);
        }
        self.pending.clear();
    }

    fn stats(&self) -> LinkStats {
        self.stats.clone()
    }
}
