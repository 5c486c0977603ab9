//! HTTP CONNECT proxy tunneling
//!
//! Encodes the CONNECT request, parses the proxy's answer with a small
//! state machine and turns the proxy connection into a tunnel.
//!
//! ```text
//! client --CONNECT host:port--> proxy
//! client <--HTTP/1.1 200 ...--- proxy
//! client <====== raw bytes =====> proxy <====> host:port
//! ```

mod handshake;
mod request;
mod response;
mod stream;

pub use handshake::negotiate;
pub use request::ConnectRequest;
pub use response::{ParseState, ResponseParser, StatusLine, MAX_RESPONSE_HEAD};
pub use stream::PrefixedStream;
