//! CONNECT handshake over an open proxy connection

use super::{ConnectRequest, ParseState, PrefixedStream, ResponseParser};
use crate::error::ProxyError;
use crate::helper::{CLOSE_TIMEOUT, DEFAULT_BUFFER_SIZE};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Ask the proxy on `stream` to open a tunnel.
///
/// The whole exchange is bounded by `timeout`. On success the returned
/// stream is a raw pipe to the target; any tunneled bytes that arrived with
/// the response head are replayed first. On failure the stream has been
/// shut down and dropped. The handshake never retries.
pub async fn negotiate<S>(
    mut stream: S,
    request: &ConnectRequest,
    timeout: Duration,
) -> Result<PrefixedStream<S>, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let deadline = Instant::now() + timeout;

    match exchange(&mut stream, request, deadline).await {
        Ok(remainder) => {
            debug!(
                "Tunnel to {} established ({} bytes read ahead)",
                request.authority(),
                remainder.len()
            );
            Ok(PrefixedStream::new(stream, remainder))
        }
        Err(e) => {
            debug!("CONNECT {} failed: {}", request.authority(), e);
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, stream.shutdown()).await;
            Err(e)
        }
    }
}

async fn exchange<S>(
    stream: &mut S,
    request: &ConnectRequest,
    deadline: Instant,
) -> Result<BytesMut, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let encoded = request.encode();
    let send = async {
        stream.write_all(&encoded).await?;
        stream.flush().await
    };
    match timeout_at(deadline, send).await {
        Err(_) => return Err(ProxyError::Timeout),
        Ok(Err(e)) => {
            debug!("Failed to send CONNECT request: {}", e);
            return Err(ProxyError::ConnectionClosed);
        }
        Ok(Ok(())) => {}
    }

    let mut parser = ResponseParser::new();
    let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];
    loop {
        let n = match timeout_at(deadline, stream.read(&mut chunk)).await {
            Err(_) => return Err(ProxyError::Timeout),
            Ok(Err(e)) => {
                debug!("Failed to read CONNECT response: {}", e);
                return Err(parser.read_error());
            }
            Ok(Ok(n)) => n,
        };

        if n == 0 {
            return Err(parser.eof_error());
        }

        if parser.feed(&chunk[..n])? == ParseState::Done {
            return Ok(parser.into_remainder());
        }
    }
}
