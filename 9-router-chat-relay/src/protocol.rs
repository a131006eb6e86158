//! Wire vocabulary shared by the relay and its clients.
//!
//! Every message on the socket is a multipart sequence of string frames. The
//! transport prefixes inbound messages with the sender's identity, so an
//! inbound multipart looks like `[identity, kind, payload]`; outbound
//! multiparts are addressed separately and carry `[kind, payload]`.
//!
//! Kind labels are case-sensitive. Anything the relay does not recognise is
//! kept as [`EventKind::Unrecognized`] so dispatch stays an exhaustive match.

use std::fmt;

use thiserror::Error;

/// Opaque per-connection token handed out by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Kinds of events a client can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Connect,
    Reconnect,
    Disconnect,
    Message,
    Ping,
    /// A label outside the vocabulary, kept verbatim for diagnostics.
    Unrecognized(String),
}

impl EventKind {
    pub fn parse(label: &str) -> Self {
        match label {
            "CONNECT" => Self::Connect,
            "RECONNECT" => Self::Reconnect,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "PING" => Self::Ping,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Connect => "CONNECT",
            Self::Reconnect => "RECONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Ping => "PING",
            Self::Unrecognized(label) => label,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kinds of frames the relay sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    OnlineUsers,
    Message,
    Error,
    Pong,
}

impl FrameKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::OnlineUsers => "ONLINE_USERS",
            Self::Message => "MESSAGE",
            Self::Error => "ERROR",
            Self::Pong => "PONG",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "ONLINE_USERS" => Some(Self::OnlineUsers),
            "MESSAGE" => Some(Self::Message),
            "ERROR" => Some(Self::Error),
            "PONG" => Some(Self::Pong),
            _ => None,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: Identity,
    pub kind: EventKind,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("expected at least {expected} frames, got {actual}")]
    MissingFrames { expected: usize, actual: usize },
}

/// Frames required in an identity-prefixed inbound multipart.
const INBOUND_FRAMES: usize = 3;

impl InboundEvent {
    pub fn new(sender: Identity, kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            sender,
            kind,
            payload: payload.into(),
        }
    }

    /// Builds an event from an identity-prefixed multipart.
    ///
    /// Frame 0 is ignored because the transport already hands over the
    /// sender identity. Frames past the payload are dropped.
    pub fn from_multipart(sender: Identity, frames: &[String]) -> Result<Self, MalformedEvent> {
        match frames {
            [_, kind, payload, ..] => Ok(Self::new(sender, EventKind::parse(kind), payload.clone())),
            _ => Err(MalformedEvent::MissingFrames {
                expected: INBOUND_FRAMES,
                actual: frames.len(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub destination: Identity,
    pub kind: FrameKind,
    pub payload: String,
}

impl OutboundFrame {
    pub fn new(destination: Identity, kind: FrameKind, payload: impl Into<String>) -> Self {
        Self {
            destination,
            kind,
            payload: payload.into(),
        }
    }

    /// Body frames handed to the transport; the destination travels separately.
    pub fn to_frames(&self) -> Vec<String> {
        vec![self.kind.label().to_string(), self.payload.clone()]
    }
}

/// Splits a MESSAGE payload into `(label, body)` on the first colon.
pub fn split_message(payload: &str) -> Option<(&str, &str)> {
    payload.split_once(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn parses_known_kinds_case_sensitively() {
        assert_eq!(EventKind::parse("CONNECT"), EventKind::Connect);
        assert_eq!(EventKind::parse("PING"), EventKind::Ping);
        assert_eq!(
            EventKind::parse("connect"),
            EventKind::Unrecognized("connect".into())
        );
        assert_eq!(
            EventKind::parse("RECONNECTED"),
            EventKind::Unrecognized("RECONNECTED".into())
        );
    }

    #[test]
    fn multipart_skips_identity_frame() {
        let event =
            InboundEvent::from_multipart("id1".into(), &frames(&["ignored", "MESSAGE", "bob:hi"]))
                .expect("three frames parse");
        assert_eq!(event.sender, Identity::from("id1"));
        assert_eq!(event.kind, EventKind::Message);
        assert_eq!(event.payload, "bob:hi");
    }

    #[test]
    fn multipart_with_missing_payload_is_malformed() {
        let result = InboundEvent::from_multipart("id1".into(), &frames(&["id1", "PING"]));
        assert_eq!(
            result,
            Err(MalformedEvent::MissingFrames {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn extra_frames_are_ignored() {
        let event = InboundEvent::from_multipart(
            "id1".into(),
            &frames(&["id1", "CONNECT", "alice", "trailing"]),
        )
        .expect("extra frames tolerated");
        assert_eq!(event.payload, "alice");
    }

    #[test]
    fn message_splits_on_first_colon_only() {
        assert_eq!(split_message("bob:at 10:30"), Some(("bob", "at 10:30")));
        assert_eq!(split_message("bob:"), Some(("bob", "")));
        assert_eq!(split_message("helloworld"), None);
    }

    #[test]
    fn outbound_frames_lead_with_kind_label() {
        let frame = OutboundFrame::new("id2".into(), FrameKind::OnlineUsers, "alice,bob");
        assert_eq!(frame.to_frames(), frames(&["ONLINE_USERS", "alice,bob"]));
    }
}
