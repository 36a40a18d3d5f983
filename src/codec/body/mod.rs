//! Payload decoding, sized by `Content-Length`.

mod length_decoder;

pub use length_decoder::LengthDecoder;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Decoder for one request's payload, selected from its [`PayloadSize`].
pub enum PayloadDecoder {
    Length(LengthDecoder),
    Empty,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn fix_length(length: u64) -> Self {
        Self::Length(LengthDecoder::new(length))
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => Self::fix_length(length),
            PayloadSize::Empty => Self::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Self::Length(length_decoder) => length_decoder.decode(src),
            Self::Empty => Ok(Some(PayloadItem::Eof)),
        }
    }
}
