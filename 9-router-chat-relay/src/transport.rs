//! ROUTER-style socket over TCP: identity-prefixed inbound multiparts,
//! identity-addressed outbound sends that never wait.

use std::{collections::HashMap, io, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use nanoid::nanoid;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    select,
    sync::{
        Mutex,
        mpsc::{self, error::TrySendError},
    },
};
use tracing::{debug, info, warn};

use crate::{
    message::{Multipart, read_multipart, write_multipart},
    protocol::Identity,
};

/// A multipart received from a peer, frame 0 being the peer's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMultipart {
    pub identity: Identity,
    pub frames: Multipart,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("no live connection for identity {0}")]
    Unroutable(Identity),
    #[error("outbound queue for identity {0} is full")]
    Full(Identity),
}

type PeerTable = Arc<Mutex<HashMap<Identity, mpsc::Sender<Multipart>>>>;

pub struct RouterSocket {
    listener: TcpListener,
    peers: PeerTable,
    inbound_tx: mpsc::Sender<InboundMultipart>,
    inbound_rx: mpsc::Receiver<InboundMultipart>,
    capacity: usize,
}

impl RouterSocket {
    pub async fn bind<A: ToSocketAddrs>(addr: A, capacity: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind router socket")?;
        Ok(Self::from_listener(listener, capacity))
    }

    pub fn from_listener(listener: TcpListener, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        Self {
            listener,
            peers: Arc::new(Mutex::new(HashMap::new())),
            inbound_tx,
            inbound_rx,
            capacity,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next inbound multipart, accepting new connections meanwhile.
    ///
    /// Cancel safe: no multipart is lost if the returned future is dropped.
    pub async fn recv(&mut self) -> InboundMultipart {
        loop {
            select! {
                accept_result = self.listener.accept() => {
                    handle_accept_result(accept_result, &self.peers, &self.inbound_tx, self.capacity);
                }
                Some(inbound) = self.inbound_rx.recv() => return inbound,
            }
        }
    }

    pub async fn send(&self, identity: &Identity, frames: Multipart) -> Result<(), SendError> {
        let outbound = self.peers.lock().await.get(identity).cloned();
        let Some(outbound) = outbound else {
            return Err(SendError::Unroutable(identity.clone()));
        };

        outbound.try_send(frames).map_err(|err| match err {
            TrySendError::Full(_) => SendError::Full(identity.clone()),
            TrySendError::Closed(_) => SendError::Unroutable(identity.clone()),
        })
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }
}

fn handle_accept_result(
    result: io::Result<(TcpStream, SocketAddr)>,
    peers: &PeerTable,
    inbound: &mpsc::Sender<InboundMultipart>,
    capacity: usize,
) {
    match result {
        Ok((stream, peer)) => spawn_connection(stream, peer, peers, inbound, capacity),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    peers: &PeerTable,
    inbound: &mpsc::Sender<InboundMultipart>,
    capacity: usize,
) {
    let identity = Identity::new(nanoid!());
    let peers = Arc::clone(peers);
    let inbound = inbound.clone();

    tokio::spawn(async move {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        peers.lock().await.insert(identity.clone(), outbound_tx);
        info!(%peer, %identity, "connection opened");

        let (reader, writer) = stream.into_split();
        let result = run_connection(&identity, reader, writer, outbound_rx, &inbound).await;

        peers.lock().await.remove(&identity);
        match result {
            Ok(()) => info!(%peer, %identity, "connection closed"),
            Err(err) => warn!(%peer, %identity, error = ?err, "connection closed with error"),
        }
    });
}

async fn run_connection<R, W>(
    identity: &Identity,
    reader: R,
    writer: W,
    outbound: mpsc::Receiver<Multipart>,
    inbound: &mpsc::Sender<InboundMultipart>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    select! {
        result = read_inbound(identity, reader, inbound) => result,
        result = write_outbound(writer, outbound) => result,
    }
}

async fn read_inbound<R>(
    identity: &Identity,
    reader: R,
    inbound: &mpsc::Sender<InboundMultipart>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let frames = match read_multipart(&mut reader).await {
            Ok(Some(frames)) => frames,
            Ok(None) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!(%identity, error = %err, "dropping undecodable multipart");
                continue;
            }
            Err(err) => return Err(err).context("failed to read from peer"),
        };

        let mut multipart = Vec::with_capacity(frames.len() + 1);
        multipart.push(identity.to_string());
        multipart.extend(frames);

        let message = InboundMultipart {
            identity: identity.clone(),
            frames: multipart,
        };
        if inbound.send(message).await.is_err() {
            debug!(%identity, "inbound queue closed");
            return Ok(());
        }
    }
}

async fn write_outbound<W>(mut writer: W, mut outbound: mpsc::Receiver<Multipart>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frames) = outbound.recv().await {
        write_multipart(&mut writer, &frames)
            .await
            .context("failed to write to peer")?;
    }
    Ok(())
}
