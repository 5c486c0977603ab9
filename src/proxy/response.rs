//! Incremental parser for the proxy's CONNECT response
//!
//! Bytes are fed as they arrive. The parser moves through
//! `AwaitingStatusLine -> AwaitingTerminator -> Done` and classifies the
//! response as soon as the status line is complete. Headers after the
//! status line are skipped, whatever they contain.

use crate::error::ProxyError;
use bytes::BytesMut;

/// Upper bound on the response head (status line plus headers)
pub const MAX_RESPONSE_HEAD: usize = 8192;

const HTTP_PREFIX: &[u8] = b"HTTP/";
const CRLF: &[u8] = b"\r\n";
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Where the parser is in the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Waiting for the first CRLF
    AwaitingStatusLine,
    /// Status was 200, waiting for the empty line ending the head
    AwaitingTerminator,
    /// Head complete, the stream is now a tunnel
    Done,
}

/// A parsed `HTTP/<version> <status> <reason>` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Version after `HTTP/`, e.g. `1.1`
    pub version: String,
    /// Numeric status code
    pub code: u16,
    /// Reason phrase, possibly empty
    pub reason: String,
}

impl StatusLine {
    /// Parse a status line without its trailing CRLF
    pub fn parse(line: &[u8]) -> Result<Self, ProxyError> {
        let line = std::str::from_utf8(line).map_err(|_| ProxyError::MalformedResponse)?;
        let mut parts = line.splitn(3, ' ');

        let version = parts
            .next()
            .and_then(|v| v.strip_prefix("HTTP/"))
            .filter(|v| is_version(v))
            .ok_or(ProxyError::MalformedResponse)?;

        let code = parts
            .next()
            .filter(|c| c.len() == 3 && c.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or(ProxyError::MalformedResponse)?;

        let reason = parts.next().unwrap_or("").trim_end();

        Ok(StatusLine {
            version: version.to_string(),
            code,
            reason: reason.to_string(),
        })
    }
}

fn is_version(v: &str) -> bool {
    let mut digits = v.split('.');
    let major = digits.next().unwrap_or("");
    let minor = digits.next();
    let valid = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    valid(major) && minor.map_or(true, valid) && digits.next().is_none()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// CONNECT response state machine
#[derive(Debug)]
pub struct ResponseParser {
    state: ParseState,
    buf: BytesMut,
    status: Option<StatusLine>,
    head_len: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Create a parser waiting for the status line
    pub fn new() -> Self {
        ResponseParser {
            state: ParseState::AwaitingStatusLine,
            buf: BytesMut::with_capacity(1024),
            status: None,
            head_len: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Whether any byte has been received
    pub fn has_data(&self) -> bool {
        !self.buf.is_empty()
    }

    /// The status line, once parsed
    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    /// Feed received bytes.
    ///
    /// Returns the state reached, or the failure as soon as the bytes seen
    /// so far decide it.
    pub fn feed(&mut self, data: &[u8]) -> Result<ParseState, ProxyError> {
        if self.state == ParseState::Done {
            self.buf.extend_from_slice(data);
            return Ok(ParseState::Done);
        }
        self.buf.extend_from_slice(data);

        loop {
            match self.state {
                ParseState::AwaitingStatusLine => {
                    let seen = self.buf.len().min(HTTP_PREFIX.len());
                    if self.buf[..seen] != HTTP_PREFIX[..seen] {
                        return Err(ProxyError::MalformedResponse);
                    }

                    let Some(end) = find(&self.buf, CRLF) else {
                        return self.need_more();
                    };
                    let status = StatusLine::parse(&self.buf[..end])?;
                    if status.code != 200 {
                        return Err(ProxyError::Rejected(status.code));
                    }
                    self.status = Some(status);
                    self.state = ParseState::AwaitingTerminator;
                }
                ParseState::AwaitingTerminator => {
                    let Some(end) = find(&self.buf, HEAD_TERMINATOR) else {
                        return self.need_more();
                    };
                    self.head_len = end + HEAD_TERMINATOR.len();
                    if self.head_len > MAX_RESPONSE_HEAD {
                        return Err(ProxyError::MalformedResponse);
                    }
                    self.state = ParseState::Done;
                }
                ParseState::Done => return Ok(ParseState::Done),
            }
        }
    }

    fn need_more(&self) -> Result<ParseState, ProxyError> {
        if self.buf.len() > MAX_RESPONSE_HEAD {
            return Err(ProxyError::MalformedResponse);
        }
        Ok(self.state)
    }

    /// Classify a clean end of stream from the proxy
    pub fn eof_error(&self) -> ProxyError {
        if self.has_data() {
            ProxyError::MalformedResponse
        } else {
            ProxyError::ConnectionClosed
        }
    }

    /// Classify a read error from the proxy
    pub fn read_error(&self) -> ProxyError {
        if self.has_data() {
            ProxyError::MalformedResponse
        } else {
            ProxyError::NoResponse
        }
    }

    /// Bytes received after the end of the response head
    pub fn into_remainder(mut self) -> BytesMut {
        if self.state == ParseState::Done {
            self.buf.split_off(self.head_len)
        } else {
            BytesMut::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_parse() {
        let status = StatusLine::parse(b"HTTP/1.1 200 Connection established").unwrap();
        assert_eq!(status.version, "1.1");
        assert_eq!(status.code, 200);
        assert_eq!(status.reason, "Connection established");
    }

    #[test]
    fn test_status_line_empty_reason() {
        let status = StatusLine::parse(b"HTTP/1.1 200 ").unwrap();
        assert_eq!(status.code, 200);
        assert_eq!(status.reason, "");

        let status = StatusLine::parse(b"HTTP/1.0 407").unwrap();
        assert_eq!(status.code, 407);
    }

    #[test]
    fn test_status_line_malformed() {
        for line in [
            &b"qwertyuiop"[..],
            b"HTTP/1.1 qwerty ",
            b"HTTP/1.1",
            b"HTTP/ 200 OK",
            b"HTTP/x.y 200 OK",
            b"HTTP/1.1 2000 OK",
            b"HTTP/1.1 20 OK",
            b"HTTP/1.1 -20 OK",
            b"HTTP/1.1  200 OK",
            b"HTTP/1.1 \xff\xfe\xfd",
        ] {
            assert_eq!(
                StatusLine::parse(line),
                Err(ProxyError::MalformedResponse),
                "{:?}",
                String::from_utf8_lossy(line)
            );
        }
    }

    #[test]
    fn test_feed_established() {
        let mut parser = ResponseParser::new();
        assert_eq!(parser.feed(b"HTTP/1.1 200 \r\n\r\n"), Ok(ParseState::Done));
        assert_eq!(parser.status().map(|s| s.code), Some(200));
        assert!(parser.into_remainder().is_empty());
    }

    #[test]
    fn test_feed_byte_by_byte() {
        let response = b"HTTP/1.0 200 Connection established\r\nProxy-Agent: test\r\n\r\n";
        let mut parser = ResponseParser::new();

        let (last, head) = response.split_last().unwrap();
        for byte in head {
            let state = parser.feed(std::slice::from_ref(byte)).unwrap();
            assert_ne!(state, ParseState::Done);
        }
        assert_eq!(parser.state(), ParseState::AwaitingTerminator);
        assert_eq!(parser.feed(&[*last]), Ok(ParseState::Done));
    }

    #[test]
    fn test_feed_keeps_trailing_bytes() {
        let mut parser = ResponseParser::new();
        let state = parser
            .feed(b"HTTP/1.1 200 OK\r\nVia: proxy\r\n\r\nsome response")
            .unwrap();
        assert_eq!(state, ParseState::Done);
        assert_eq!(&parser.into_remainder()[..], b"some response");
    }

    #[test]
    fn test_feed_rejected() {
        let mut parser = ResponseParser::new();
        assert_eq!(
            parser.feed(b"HTTP/1.1 429 \r\n\r\n"),
            Err(ProxyError::Rejected(429))
        );

        // Classified before the headers finish
        let mut parser = ResponseParser::new();
        assert_eq!(
            parser.feed(b"HTTP/1.1 407 Proxy Authentication Required\r\nProxy-Auth"),
            Err(ProxyError::Rejected(407))
        );
    }

    #[test]
    fn test_feed_rejects_garbage_early() {
        let mut parser = ResponseParser::new();
        assert_eq!(parser.feed(b"qwer"), Err(ProxyError::MalformedResponse));

        let mut parser = ResponseParser::new();
        assert_eq!(parser.feed(b"HT"), Ok(ParseState::AwaitingStatusLine));
        assert_eq!(parser.feed(b"XP"), Err(ProxyError::MalformedResponse));
    }

    #[test]
    fn test_feed_non_numeric_status() {
        let mut parser = ResponseParser::new();
        assert_eq!(
            parser.feed(b"HTTP/1.1 qwerty \r\n\r\n"),
            Err(ProxyError::MalformedResponse)
        );
    }

    #[test]
    fn test_feed_oversized_head() {
        let mut parser = ResponseParser::new();
        parser.feed(b"HTTP/1.1 200 OK\r\n").unwrap();

        let filler = vec![b'a'; MAX_RESPONSE_HEAD];
        assert_eq!(parser.feed(&filler), Err(ProxyError::MalformedResponse));

        let mut parser = ResponseParser::new();
        let mut line = b"HTTP/1.1 200 ".to_vec();
        line.extend(vec![b'x'; MAX_RESPONSE_HEAD]);
        assert_eq!(parser.feed(&line), Err(ProxyError::MalformedResponse));
    }

    #[test]
    fn test_eof_and_read_error_classification() {
        let parser = ResponseParser::new();
        assert_eq!(parser.eof_error(), ProxyError::ConnectionClosed);
        assert_eq!(parser.read_error(), ProxyError::NoResponse);

        let mut parser = ResponseParser::new();
        parser.feed(b"HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(parser.eof_error(), ProxyError::MalformedResponse);
        assert_eq!(parser.read_error(), ProxyError::MalformedResponse);
    }

    #[test]
    fn test_remainder_empty_before_done() {
        let mut parser = ResponseParser::new();
        parser.feed(b"HTTP/1.1 200 OK\r\n").unwrap();
        assert!(parser.into_remainder().is_empty());
    }
}
