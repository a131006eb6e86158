//! Session directory and routing state machine. No I/O happens here.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::{
    config::SenderLabel,
    protocol::{EventKind, FrameKind, Identity, InboundEvent, OutboundFrame, split_message},
};

pub const INVALID_FORMAT: &str = "Invalid message format.";
pub const SELF_SEND: &str = "Cannot send a message to yourself.";

pub fn recipient_not_found(recipient: &str) -> String {
    format!("Recipient {recipient} not found.")
}

/// Username to connection identity, one identity per username.
#[derive(Debug, Default)]
pub struct Directory {
    entries: BTreeMap<String, Identity>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `username` to `identity`, returning the identity it replaced.
    pub fn assign(&mut self, username: &str, identity: Identity) -> Option<Identity> {
        self.entries.insert(username.to_string(), identity)
    }

    pub fn remove(&mut self, username: &str) -> Option<Identity> {
        self.entries.remove(username)
    }

    pub fn lookup(&self, username: &str) -> Option<&Identity> {
        self.entries.get(username)
    }

    /// Reverse lookup by linear scan.
    pub fn username_of(&self, identity: &Identity) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, bound)| *bound == identity)
            .map(|(username, _)| username.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Comma-joined usernames in lexicographic order.
    pub fn roster(&self) -> String {
        self.entries
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Bound identities, one per entry; an identity holding two usernames appears twice.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.values()
    }
}

pub struct Router {
    directory: Directory,
    sender_label: SenderLabel,
}

impl Router {
    pub fn new(sender_label: SenderLabel) -> Self {
        Self {
            directory: Directory::new(),
            sender_label,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn handle(&mut self, event: InboundEvent) -> Vec<OutboundFrame> {
        let InboundEvent {
            sender,
            kind,
            payload,
        } = event;

        match kind {
            EventKind::Connect => {
                self.directory.assign(&payload, sender.clone());
                info!(%sender, username = %payload, "user connected");
                self.roster_broadcast()
            }
            EventKind::Reconnect => {
                let previous = self.directory.assign(&payload, sender.clone());
                info!(%sender, username = %payload, ?previous, "user reconnected");
                self.roster_broadcast()
            }
            EventKind::Disconnect => {
                match self.directory.remove(&payload) {
                    Some(_) => info!(%sender, username = %payload, "user disconnected"),
                    None => debug!(%sender, username = %payload, "disconnect for unknown user"),
                }
                self.roster_broadcast()
            }
            EventKind::Message => self.route_message(sender, &payload),
            EventKind::Ping => {
                debug!(%sender, "ping");
                vec![OutboundFrame::new(sender, FrameKind::Pong, "")]
            }
            EventKind::Unrecognized(label) => {
                warn!(%sender, kind = %label, "unrecognized event kind");
                Vec::new()
            }
        }
    }

    fn route_message(&self, sender: Identity, payload: &str) -> Vec<OutboundFrame> {
        let Some((recipient, body)) = split_message(payload) else {
            debug!(%sender, "message without recipient separator");
            return vec![OutboundFrame::new(sender, FrameKind::Error, INVALID_FORMAT)];
        };

        let Some(recipient_id) = self.directory.lookup(recipient) else {
            debug!(%sender, recipient, "recipient not found");
            return vec![OutboundFrame::new(
                sender,
                FrameKind::Error,
                recipient_not_found(recipient),
            )];
        };

        if *recipient_id == sender {
            debug!(%sender, recipient, "rejected message to self");
            return vec![OutboundFrame::new(sender, FrameKind::Error, SELF_SEND)];
        }

        let label = self.sender_label(&sender);
        info!(
            %sender,
            from = ?self.directory.username_of(&sender),
            recipient,
            "routing message"
        );
        vec![OutboundFrame::new(
            recipient_id.clone(),
            FrameKind::Message,
            format!("{label}:{body}"),
        )]
    }

    fn sender_label(&self, sender: &Identity) -> String {
        match self.sender_label {
            SenderLabel::Identity => sender.to_string(),
            SenderLabel::Username => self
                .directory
                .username_of(sender)
                .map_or_else(|| sender.to_string(), str::to_string),
        }
    }

    fn roster_broadcast(&self) -> Vec<OutboundFrame> {
        let roster = self.directory.roster();
        debug!(%roster, "broadcasting online users");
        self.directory
            .identities()
            .map(|identity| OutboundFrame::new(identity.clone(), FrameKind::OnlineUsers, &roster))
            .collect()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(SenderLabel::default())
    }
}
