use anyhow::{bail, ensure, Context};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const MAX_HEADER_BYTES: usize = 64 * 1024;
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length(usize),
    Chunked,
    UntilClose,
}

pub struct ResponseReader {
    max_body_bytes: usize,
}

impl ResponseReader {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    pub async fn read<T: AsyncRead + Unpin>(&self, stream: &mut T) -> anyhow::Result<HttpResponse> {
        let mut buf = Vec::with_capacity(READ_CHUNK);
        let mut chunk = vec![0u8; READ_CHUNK];

        let header_end = loop {
            if let Some(end) = find_header_end(&buf) {
                break end;
            }
            ensure!(
                buf.len() <= MAX_HEADER_BYTES,
                "response headers exceed {MAX_HEADER_BYTES} bytes"
            );
            let n = stream
                .read(&mut chunk)
                .await
                .context("failed to read response headers")?;
            if n == 0 {
                bail!("connection closed before response headers");
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        let status = parse_status_line(&buf[..header_end])?;
        let framing = parse_framing(&buf[..header_end]);
        let mut body = buf.split_off(header_end);

        match framing {
            Framing::Length(len) => {
                ensure!(
                    len <= self.max_body_bytes,
                    "content length {len} exceeds limit of {} bytes",
                    self.max_body_bytes
                );
                while body.len() < len {
                    let n = stream
                        .read(&mut chunk)
                        .await
                        .context("failed to read response body")?;
                    if n == 0 {
                        bail!("connection closed after {} of {len} body bytes", body.len());
                    }
                    body.extend_from_slice(&chunk[..n]);
                }
                body.truncate(len);
            }
            Framing::Chunked => {
                body = self.read_chunked(stream, body, &mut chunk).await?;
            }
            Framing::UntilClose => {
                self.read_until_close(stream, &mut body, &mut chunk).await?;
            }
        }

        Ok(HttpResponse { status, body })
    }

    /// Decodes chunks as they arrive and returns at the zero-size chunk, so
    /// a peer that keeps the connection open does not stall the read.
    /// Trailers are not consumed.
    async fn read_chunked<T: AsyncRead + Unpin>(
        &self,
        stream: &mut T,
        mut pending: Vec<u8>,
        chunk: &mut [u8],
    ) -> anyhow::Result<Vec<u8>> {
        let mut body = Vec::new();
        loop {
            let line = next_line(stream, &mut pending, chunk).await?;
            let size = parse_chunk_size(&line)?;
            if size == 0 {
                return Ok(body);
            }
            ensure!(
                size <= self.max_body_bytes.saturating_sub(body.len()),
                "response body exceeds limit of {} bytes",
                self.max_body_bytes
            );
            while pending.len() < size {
                let n = stream
                    .read(chunk)
                    .await
                    .context("failed to read chunk data")?;
                if n == 0 {
                    bail!("connection closed inside chunk of {size} bytes");
                }
                pending.extend_from_slice(&chunk[..n]);
            }
            body.extend(pending.drain(..size));
            next_line(stream, &mut pending, chunk).await?;
        }
    }

    async fn read_until_close<T: AsyncRead + Unpin>(
        &self,
        stream: &mut T,
        body: &mut Vec<u8>,
        chunk: &mut [u8],
    ) -> anyhow::Result<()> {
        loop {
            ensure!(
                body.len() <= self.max_body_bytes,
                "response body exceeds limit of {} bytes",
                self.max_body_bytes
            );
            match stream.read(chunk).await {
                Ok(0) => return Ok(()),
                Ok(n) => body.extend_from_slice(&chunk[..n]),
                // Peers routinely drop the socket without a TLS close_notify.
                Err(err) => {
                    debug!(error = %err, "treating read error as end of body");
                    return Ok(());
                }
            }
        }
    }
}

/// End of the header block. Lines may end in CRLF or a bare LF.
pub(crate) fn find_header_end(bytes: &[u8]) -> Option<usize> {
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .find_map(|(pos, _)| {
            let rest = &bytes[pos + 1..];
            if rest.starts_with(b"\n") {
                Some(pos + 2)
            } else if rest.starts_with(b"\r\n") {
                Some(pos + 3)
            } else {
                None
            }
        })
}

/// Takes one line off `pending`, reading more from `stream` as needed.
async fn next_line<T: AsyncRead + Unpin>(
    stream: &mut T,
    pending: &mut Vec<u8>,
    chunk: &mut [u8],
) -> anyhow::Result<Vec<u8>> {
    loop {
        if let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(line);
        }
        ensure!(
            pending.len() <= MAX_HEADER_BYTES,
            "chunk line exceeds {MAX_HEADER_BYTES} bytes"
        );
        let n = stream
            .read(chunk)
            .await
            .context("failed to read chunk size line")?;
        if n == 0 {
            bail!("connection closed inside chunked body");
        }
        pending.extend_from_slice(&chunk[..n]);
    }
}

fn parse_chunk_size(line: &[u8]) -> anyhow::Result<usize> {
    let line = std::str::from_utf8(line).context("invalid chunk size")?;
    let size_hex = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(size_hex, 16).with_context(|| format!("invalid chunk size {size_hex:?}"))
}

fn header_lines(head: &[u8]) -> impl Iterator<Item = &[u8]> {
    head.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

fn parse_status_line(head: &[u8]) -> anyhow::Result<u16> {
    let line = header_lines(head).next().unwrap_or_default();
    let line = std::str::from_utf8(line).context("status line is not valid UTF-8")?;
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse()
            .with_context(|| format!("invalid status code in {line:?}")),
        _ => bail!("malformed status line {line:?}"),
    }
}

fn parse_framing(head: &[u8]) -> Framing {
    let mut length = None;
    for line in header_lines(head).skip(1) {
        let Some((name, value)) = split_header(line) else {
            continue;
        };
        if name.eq_ignore_ascii_case("transfer-encoding")
            && value.to_ascii_lowercase().contains("chunked")
        {
            return Framing::Chunked;
        }
        if name.eq_ignore_ascii_case("content-length") {
            length = value.parse::<usize>().ok();
        }
    }
    length.map(Framing::Length).unwrap_or(Framing::UntilClose)
}

fn split_header(line: &[u8]) -> Option<(&str, &str)> {
    let line = std::str::from_utf8(line).ok()?;
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reads_body_by_content_length() {
        let reader = ResponseReader::new(1024);
        let mut data: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nBodyTrailing";
        let resp = reader.read(&mut data).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"Body");
    }

    #[tokio::test]
    async fn reads_until_close_without_length() {
        let reader = ResponseReader::new(1024);
        let mut data: &[u8] = b"HTTP/1.0 404 Not Found\r\nServer: test\r\n\r\nmissing page";
        let resp = reader.read(&mut data).await.unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, b"missing page");
    }

    #[tokio::test]
    async fn decodes_chunked_bodies() {
        let reader = ResponseReader::new(1024);
        let mut data: &[u8] =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nwww.\r\na;ext=1\r\ngoogle.com\r\n0\r\n\r\n";
        let resp = reader.read(&mut data).await.unwrap();
        assert_eq!(resp.body, b"www.google.com");
    }

    #[tokio::test]
    async fn chunked_read_stops_at_last_chunk_while_peer_stays_open() {
        let reader = ResponseReader::new(1024);
        let (mut client, mut server) = tokio::io::duplex(4096);
        server
            .write_all(
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nwww.\r\na\r\ngoogle.com\r\n0\r\n\r\n",
            )
            .await
            .unwrap();

        let resp = tokio::time::timeout(Duration::from_secs(2), reader.read(&mut client))
            .await
            .expect("chunked read should not wait for close")
            .unwrap();
        assert_eq!(resp.body, b"www.google.com");
        drop(server);
    }

    #[tokio::test]
    async fn chunked_bodies_respect_the_limit() {
        let reader = ResponseReader::new(8);
        let mut data: &[u8] =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nwww.\r\na\r\ngoogle.com\r\n0\r\n\r\n";
        assert!(reader.read(&mut data).await.is_err());
    }

    #[tokio::test]
    async fn accepts_bare_lf_header_lines() {
        let reader = ResponseReader::new(1024);
        let mut data: &[u8] = b"HTTP/1.0 200 OK\nContent-Length: 5\n\nhello";
        let resp = reader.read(&mut data).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"hello");
    }

    #[tokio::test]
    async fn rejects_non_http_replies() {
        let reader = ResponseReader::new(1024);
        let mut data: &[u8] = b"SSH-2.0-OpenSSH_9.6\r\n\r\n";
        assert!(reader.read(&mut data).await.is_err());
    }

    #[tokio::test]
    async fn rejects_short_bodies_and_oversized_lengths() {
        let reader = ResponseReader::new(1024);
        let mut short: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc";
        assert!(reader.read(&mut short).await.is_err());

        let small = ResponseReader::new(2);
        let mut large: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc";
        assert!(small.read(&mut large).await.is_err());
    }

    #[test]
    fn finds_header_end_with_body() {
        let resp = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nBody";
        assert_eq!(find_header_end(resp), Some(38));
        assert_eq!(find_header_end(b"HTTP/1.0 200 OK\n\nBody"), Some(17));
        assert_eq!(find_header_end(b"HTTP/1.0 200 OK\r\nServer: x\r\n"), None);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let head = b"HTTP/1.1 200 OK\r\ncontent-LENGTH: 12\r\n\r\n";
        assert_eq!(parse_framing(head), Framing::Length(12));
    }
}
