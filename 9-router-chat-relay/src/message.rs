use std::io;

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// One multipart message: an ordered list of string frames.
pub type Multipart = Vec<String>;

pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    // Each multipart is a JSON array on its own line, so netcat can drive the relay.
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if trimmed.is_empty() {
            continue;
        }

        let parsed = serde_json::from_str(trimmed).map_err(to_io_error)?;
        return Ok(Some(parsed));
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut encoded = serde_json::to_vec(message).map_err(to_io_error)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_multipart<R>(reader: &mut R) -> io::Result<Option<Multipart>>
where
    R: AsyncBufRead + Unpin,
{
    read_message(reader).await
}

pub async fn write_multipart<W>(writer: &mut W, frames: &[String]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_message(writer, frames).await
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multipart_survives_the_line_codec() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = tokio::io::BufReader::new(reader);
        let frames = vec!["MESSAGE".to_string(), "bob:line one\nline two".to_string()];

        write_multipart(&mut writer, &frames)
            .await
            .expect("write multipart");
        let parsed = read_multipart(&mut reader)
            .await
            .expect("read multipart")
            .expect("expected multipart");

        assert_eq!(frames, parsed);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = tokio::io::BufReader::new(reader);

        writer.write_all(b"\r\n\n[\"PING\",\"\"]\n").await.expect("write");
        let parsed = read_multipart(&mut reader)
            .await
            .expect("read multipart")
            .expect("expected multipart");

        assert_eq!(parsed, vec!["PING".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn non_array_line_is_invalid_data() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = tokio::io::BufReader::new(reader);

        writer.write_all(b"{\"type\":\"hello\"}\n").await.expect("write");
        let err = read_multipart(&mut reader)
            .await
            .expect_err("object is not a multipart");

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn eof_reads_as_none() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(writer);
        let mut reader = tokio::io::BufReader::new(reader);

        assert!(read_multipart(&mut reader).await.expect("read").is_none());
    }
}
