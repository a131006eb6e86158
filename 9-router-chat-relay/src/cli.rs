use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_LISTEN, DEFAULT_QUEUE_CAPACITY, RelayConfig, SenderLabel};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay, routing chat messages between connected users.
    Relay(RelayArgs),
    /// Connect to a relay as a named user.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RelayArgs {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// How the sender of a routed message is labelled for its recipient.
    #[arg(long, value_enum, default_value_t = SenderLabel::Identity)]
    pub sender_label: SenderLabel,

    /// Bound on queued inbound events and on each connection's outbound frames.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

impl RelayArgs {
    pub fn config(&self) -> RelayConfig {
        RelayConfig::new(self.listen)
            .with_sender_label(self.sender_label)
            .with_queue_capacity(self.queue_capacity)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Username announced to the relay on connect.
    #[arg(long)]
    pub username: String,

    /// Address of the relay to connect to.
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub server: SocketAddr,
}
