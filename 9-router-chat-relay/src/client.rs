use std::{io, net::SocketAddr};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    message::{Multipart, read_multipart, write_multipart},
    protocol::{EventKind, FrameKind, split_message},
};

/// A frame received from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFrame {
    pub kind: FrameKind,
    pub payload: String,
}

impl ServerFrame {
    pub fn new(kind: FrameKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("relay connection failed: {0}")]
    Io(#[from] io::Error),
    #[error("relay sent {0} frames, expected kind and payload")]
    FrameCount(usize),
    #[error("relay sent unknown frame kind {0:?}")]
    UnknownKind(String),
}

pub struct RelayClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RelayClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    pub async fn send(&mut self, kind: &EventKind, payload: &str) -> Result<(), ClientError> {
        self.send_frames(&[kind.label().to_string(), payload.to_string()])
            .await
    }

    /// Sends raw frames, bypassing the kind vocabulary.
    pub async fn send_frames(&mut self, frames: &[String]) -> Result<(), ClientError> {
        write_multipart(&mut self.writer, frames).await?;
        Ok(())
    }

    pub async fn connect_as(&mut self, username: &str) -> Result<(), ClientError> {
        self.send(&EventKind::Connect, username).await
    }

    pub async fn reconnect_as(&mut self, username: &str) -> Result<(), ClientError> {
        self.send(&EventKind::Reconnect, username).await
    }

    pub async fn disconnect(&mut self, username: &str) -> Result<(), ClientError> {
        self.send(&EventKind::Disconnect, username).await
    }

    pub async fn message(&mut self, recipient: &str, body: &str) -> Result<(), ClientError> {
        self.send(&EventKind::Message, &format!("{recipient}:{body}"))
            .await
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        self.send(&EventKind::Ping, "").await
    }

    /// Next frame from the relay, or `None` once the relay hangs up.
    pub async fn recv(&mut self) -> Result<Option<ServerFrame>, ClientError> {
        match read_multipart(&mut self.reader).await? {
            Some(frames) => parse_server_frame(frames).map(Some),
            None => Ok(None),
        }
    }

    pub async fn shutdown(mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

fn parse_server_frame(frames: Multipart) -> Result<ServerFrame, ClientError> {
    let count = frames.len();
    let [kind, payload]: [String; 2] = frames
        .try_into()
        .map_err(|_| ClientError::FrameCount(count))?;
    let kind = FrameKind::parse(&kind).ok_or(ClientError::UnknownKind(kind))?;
    Ok(ServerFrame { kind, payload })
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let mut client = RelayClient::connect(args.server).await?;
    info!("connected to {}", args.server);
    client.connect_as(&args.username).await?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();

    run_client_loop(&mut client, &args.username, &mut stdin, &mut input).await?;
    if let Err(error) = client.shutdown().await {
        warn!(?error, "failed to shutdown client writer cleanly");
    }

    Ok(())
}

enum Input {
    Relay(Result<Option<ServerFrame>, ClientError>),
    Stdin(io::Result<usize>),
    Interrupt(io::Result<()>),
}

async fn run_client_loop(
    client: &mut RelayClient,
    username: &str,
    stdin: &mut BufReader<tokio::io::Stdin>,
    input: &mut String,
) -> Result<()> {
    loop {
        input.clear();
        let next = select! {
            frame = client.recv() => Input::Relay(frame),
            bytes_read = stdin.read_line(input) => Input::Stdin(bytes_read),
            ctrl_c = tokio::signal::ctrl_c() => Input::Interrupt(ctrl_c),
        };

        let keep_going = match next {
            Input::Relay(frame) => handle_relay_frame(frame).await?,
            Input::Stdin(bytes_read) => handle_stdin_input(bytes_read, input, client, username).await?,
            Input::Interrupt(result) => {
                if let Err(error) = result {
                    warn!(?error, "ctrl-c handler failed");
                }
                client.disconnect(username).await?;
                false
            }
        };
        if !keep_going {
            break;
        }
    }
    Ok(())
}

async fn handle_relay_frame(frame: Result<Option<ServerFrame>, ClientError>) -> Result<bool> {
    match frame {
        Ok(Some(frame)) => {
            write_rendered(render_server_frame(&frame)).await?;
            Ok(true)
        }
        Ok(None) => {
            write_stdout("*** relay closed the connection").await?;
            Ok(false)
        }
        Err(error @ (ClientError::FrameCount(_) | ClientError::UnknownKind(_))) => {
            warn!(%error, "ignoring unexpected frame from relay");
            Ok(true)
        }
        Err(error) => Err(error.into()),
    }
}

/// What a line typed by the user asks for.
#[derive(Debug, PartialEq, Eq)]
enum InputLine<'a> {
    Blank,
    Quit,
    Ping,
    Message { recipient: &'a str, body: &'a str },
    Invalid,
}

fn parse_input_line(line: &str) -> InputLine<'_> {
    let text = line.trim();
    if text.is_empty() {
        return InputLine::Blank;
    }
    if text.eq_ignore_ascii_case("/quit") {
        return InputLine::Quit;
    }
    if text.eq_ignore_ascii_case("/ping") {
        return InputLine::Ping;
    }

    match split_message(text) {
        Some((recipient, body)) if !recipient.trim().is_empty() => InputLine::Message {
            recipient: recipient.trim(),
            body: body.trim_start(),
        },
        _ => InputLine::Invalid,
    }
}

async fn handle_stdin_input(
    bytes_read: io::Result<usize>,
    input: &str,
    client: &mut RelayClient,
    username: &str,
) -> Result<bool> {
    if bytes_read? == 0 {
        client.disconnect(username).await?;
        return Ok(false);
    }

    match parse_input_line(input) {
        InputLine::Blank => {}
        InputLine::Quit => {
            client.disconnect(username).await?;
            write_stdout("*** leaving chat").await?;
            return Ok(false);
        }
        InputLine::Ping => client.ping().await?,
        InputLine::Message { recipient, body } => client.message(recipient, body).await?,
        InputLine::Invalid => {
            write_stderr("!!! usage: <recipient>: <message>, /ping or /quit").await?
        }
    }
    Ok(true)
}

#[derive(Debug, PartialEq, Eq)]
enum Rendered {
    Stdout(String),
    Stderr(String),
}

fn render_server_frame(frame: &ServerFrame) -> Rendered {
    match frame.kind {
        FrameKind::OnlineUsers => {
            let users: Vec<&str> = frame.payload.split(',').filter(|u| !u.is_empty()).collect();
            Rendered::Stdout(format!("*** online: {}", users.join(", ")))
        }
        FrameKind::Message => match split_message(&frame.payload) {
            Some((sender, body)) => Rendered::Stdout(format!("<{sender}> {body}")),
            None => Rendered::Stdout(frame.payload.clone()),
        },
        FrameKind::Error => Rendered::Stderr(format!("!!! {}", frame.payload)),
        FrameKind::Pong => Rendered::Stdout("*** pong".to_string()),
    }
}

async fn write_rendered(rendered: Rendered) -> io::Result<()> {
    match rendered {
        Rendered::Stdout(line) => write_stdout(&line).await,
        Rendered::Stderr(line) => write_stderr(&line).await,
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(parts: &[&str]) -> Multipart {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn parses_known_server_frames() {
        let frame = parse_server_frame(frames(&["ERROR", "Invalid message format."]))
            .expect("valid frame");
        assert_eq!(frame, ServerFrame::new(FrameKind::Error, "Invalid message format."));
    }

    #[test]
    fn rejects_wrong_frame_count() {
        let result = parse_server_frame(frames(&["PONG"]));
        assert!(matches!(result, Err(ClientError::FrameCount(1))));
    }

    #[test]
    fn rejects_unknown_kind() {
        let result = parse_server_frame(frames(&["WELCOME", "alice"]));
        assert!(matches!(result, Err(ClientError::UnknownKind(kind)) if kind == "WELCOME"));
    }

    #[test]
    fn input_lines_map_to_commands() {
        assert_eq!(parse_input_line("   \n"), InputLine::Blank);
        assert_eq!(parse_input_line("/quit\n"), InputLine::Quit);
        assert_eq!(parse_input_line("/PING"), InputLine::Ping);
        assert_eq!(
            parse_input_line("bob: see you at 10:30\n"),
            InputLine::Message {
                recipient: "bob",
                body: "see you at 10:30"
            }
        );
        assert_eq!(parse_input_line("no recipient here"), InputLine::Invalid);
        assert_eq!(parse_input_line(": orphan body"), InputLine::Invalid);
    }

    #[test]
    fn frames_render_for_the_terminal() {
        assert_eq!(
            render_server_frame(&ServerFrame::new(FrameKind::OnlineUsers, "alice,bob")),
            Rendered::Stdout("*** online: alice, bob".into())
        );
        assert_eq!(
            render_server_frame(&ServerFrame::new(FrameKind::OnlineUsers, "")),
            Rendered::Stdout("*** online: ".into())
        );
        assert_eq!(
            render_server_frame(&ServerFrame::new(FrameKind::Message, "alice:hi: there")),
            Rendered::Stdout("<alice> hi: there".into())
        );
        assert_eq!(
            render_server_frame(&ServerFrame::new(FrameKind::Error, "Recipient carol not found.")),
            Rendered::Stderr("!!! Recipient carol not found.".into())
        );
        assert_eq!(
            render_server_frame(&ServerFrame::new(FrameKind::Pong, "")),
            Rendered::Stdout("*** pong".into())
        );
    }

    #[tokio::test]
    async fn unexpected_frames_do_not_end_the_session() {
        let keep_going = handle_relay_frame(Err(ClientError::UnknownKind("WELCOME".into())))
            .await
            .expect("unknown kind is tolerated");
        assert!(keep_going);

        let keep_going = handle_relay_frame(Err(ClientError::FrameCount(1)))
            .await
            .expect("short multipart is tolerated");
        assert!(keep_going);

        let result = handle_relay_frame(Err(ClientError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        ))))
        .await;
        assert!(result.is_err());
    }
}
