use std::net::SocketAddr;

use clap::ValueEnum;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5555";
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// How the sender of a routed MESSAGE is rendered to its recipient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SenderLabel {
    /// The sender's raw connection identity.
    #[default]
    Identity,
    /// The sender's registered username, or the identity when it has none.
    Username,
}

/// Settings the relay needs at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub sender_label: SenderLabel,
    /// Capacity of the inbound event queue and of every per-connection outbound queue.
    pub queue_capacity: usize,
}

impl RelayConfig {
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            sender_label: SenderLabel::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_sender_label(mut self, sender_label: SenderLabel) -> Self {
        self.sender_label = sender_label;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        // tokio's bounded channels panic on zero capacity.
        self.queue_capacity = queue_capacity.max(1);
        self
    }
}
