//! Protocol-level types shared by the codec and the connection driver.

mod error;
mod message;
mod request;
mod response;

pub use error::{HttpError, ParseError, SendError};
pub use message::{Message, PayloadItem, PayloadSize};
pub use request::RequestHead;
pub use response::ResponseHead;
