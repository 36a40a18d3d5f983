//! Error types for HTTP protocol handling.
//!
//! [`HttpError`] is the top-level error at the connection boundary; it
//! wraps [`ParseError`] (request side) and [`SendError`] (response side).
//! Syscall-level failures stay `std::io::Error` shaped and are wrapped at
//! the layer that observes them.

use std::io;
use thiserror::Error;

/// The top-level error type for HTTP connection processing.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Errors while parsing and framing the request
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    /// Errors while encoding the response
    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Errors that occur during HTTP request parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Header block exceeds the maximum allowed size
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    /// Number of headers exceeds the maximum allowed
    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    /// Accumulated body exceeds the configured cap
    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: usize, max_size: usize },

    /// Invalid header format or content
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    /// Unsupported HTTP version
    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    /// Invalid or missing HTTP method
    #[error("invalid http method")]
    InvalidMethod,

    /// Invalid request target
    #[error("invalid http uri")]
    InvalidUri,

    /// I/O error during parsing
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_body(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }
}

/// Errors that occur during HTTP response encoding.
#[derive(Error, Debug)]
pub enum SendError {
    /// Response head cannot be represented on the wire
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// I/O error during sending
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_response<S: ToString>(reason: S) -> Self {
        Self::InvalidResponse { reason: reason.to_string() }
    }
}
