use std::{future::Future, net::SocketAddr};

use anyhow::Result;
use tokio::select;
use tracing::{info, warn};

use crate::{
    config::RelayConfig,
    protocol::InboundEvent,
    router::Router,
    transport::{InboundMultipart, RouterSocket, SendError},
};

/// Single consumer of the socket's inbound stream.
///
/// The relay owns the [`Router`], so directory mutations are serialized by
/// construction: one multipart is handled to completion, including every
/// outbound send, before the next one is taken off the socket.
pub struct Relay {
    socket: RouterSocket,
    router: Router,
}

impl Relay {
    pub fn new(socket: RouterSocket, config: &RelayConfig) -> Self {
        Self {
            socket,
            router: Router::new(config.sender_label),
        }
    }

    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let socket = RouterSocket::bind(config.listen, config.queue_capacity).await?;
        Ok(Self::new(socket, config))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Relay {
            mut socket,
            mut router,
        } = self;
        tokio::pin!(shutdown);

        loop {
            let inbound = select! {
                _ = &mut shutdown => {
                    info!(users = router.directory().len(), "relay shutting down");
                    break;
                }
                inbound = socket.recv() => inbound,
            };
            process_inbound(&socket, &mut router, inbound).await;
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

async fn process_inbound(socket: &RouterSocket, router: &mut Router, inbound: InboundMultipart) {
    let InboundMultipart { identity, frames } = inbound;
    let event = match InboundEvent::from_multipart(identity, &frames) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, ?frames, "ignoring malformed event");
            return;
        }
    };

    for frame in router.handle(event) {
        if let Err(err) = socket.send(&frame.destination, frame.to_frames()).await {
            log_send_failure(&err, frame.kind.label());
        }
    }
}

fn log_send_failure(err: &SendError, kind: &str) {
    match err {
        SendError::Unroutable(_) => info!(error = %err, kind, "dropping frame for departed peer"),
        SendError::Full(_) => warn!(error = %err, kind, "dropping frame for slow peer"),
    }
}
