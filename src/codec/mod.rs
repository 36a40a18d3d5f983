//! Incremental HTTP/1.1 encoding and decoding.
//!
//! The codec is sans-IO: it works on `BytesMut` through the
//! `tokio_util::codec` traits and never touches a socket. The connection
//! driver appends whatever chunks arrive and calls `decode` until a full
//! request has been framed, so any partition of the byte stream into
//! chunks produces the same parse.
//!
//! # Components
//!
//! - [`RequestDecoder`]: header parsing then `Content-Length` framed body
//!   parsing, reusable across keep-alive requests
//! - [`ResponseEncoder`]: status line, headers, and a fully materialized
//!   body in one pass

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
