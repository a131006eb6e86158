//! Username-addressed chat relay over a ROUTER-style socket.
//!
//! Clients connect over TCP, announce a username, and send point-to-point
//! messages addressed by username. The relay keeps a directory of who is
//! online, routes messages through it, and pushes the online roster to every
//! registered connection whenever the directory changes.
//!
//! - [`router`] holds the directory and the routing state machine. It does no
//!   I/O: each inbound event maps to a list of outbound frames.
//! - [`protocol`] defines the closed set of event and frame kinds and how
//!   they map onto multipart frames.
//! - [`transport`] is the ROUTER-style socket: it tags every inbound
//!   multipart with the sending connection's identity and addresses replies
//!   by identity.
//! - [`relay`] is the single-consumer loop feeding the router from the socket.
//! - [`message`] provides the JSON line framing used on the wire.
//! - [`client`] is a programmatic and interactive client.
//! - [`cli`] and [`config`] cover startup options.

pub mod cli;
pub mod client;
pub mod config;
pub mod message;
pub mod protocol;
pub mod relay;
pub mod router;
pub mod transport;
