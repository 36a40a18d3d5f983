//! The per-connection state machine.
//!
//! An [`HttpConnection`] cycles read → parse → dispatch → write → read
//! for as long as the peer keeps the connection alive. Requests on one
//! connection are strictly serialized: the next request's bytes are not
//! consumed until the previous response has been written in full.
//!
//! The connection lives on the heap under `Rc<RefCell<_>>` and is kept
//! alive by whichever continuation is currently outstanding; when a step
//! declines to arm a successor (peer closed, error, idle timeout), the
//! last strong reference dies, the socket deregisters and closes, and the
//! connection is gone.
//!
//! The read idle timeout is layered from primitives: a timer whose expiry
//! requests stop on the read's stop token, while natural read completion
//! first requests stop on the timer, making it inert.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use http::header::{HeaderValue, CONNECTION, CONTENT_TYPE, SERVER};
use http::{HeaderMap, Method, StatusCode, Uri};
use socket2::Socket;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, trace, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::ensure;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, RequestHead, ResponseHead};
use crate::runtime::{is_cancelled, AsyncFd, Callback, Reactor, StopSource};
use crate::server::{Router, ServerConfig};

const DEFAULT_CONTENT_TYPE: &str = "text/plain;charset=utf-8";
const SERVER_NAME: &str = "co_http";

pub(crate) struct HttpConnection {
    conn: AsyncFd,
    /// Scratch for inbound chunks; travels through `async_read` and comes
    /// back with each completion.
    read_buf: Option<BytesMut>,
    /// Bytes received but not yet consumed by the decoder.
    acc: BytesMut,
    decoder: RequestDecoder,
    /// Head of the request currently being framed.
    head: Option<RequestHead>,
    body: BytesMut,
    encoder: ResponseEncoder,
    write_buf: BytesMut,
    router: Rc<Router>,
    config: Rc<ServerConfig>,
}

enum Step {
    Read,
    Dispatch,
    Close,
}

impl HttpConnection {
    /// Takes ownership of an accepted socket and starts the read loop.
    pub(crate) fn spawn(socket: Socket, router: Rc<Router>, config: Rc<ServerConfig>) {
        let conn = match AsyncFd::new(socket) {
            Ok(conn) => conn,
            Err(error) => {
                warn!(%error, "failed to register accepted connection");
                return;
            }
        };
        let read_buf = BytesMut::zeroed(config.read_buffer_size);
        let this = Rc::new(RefCell::new(Self {
            conn,
            read_buf: Some(read_buf),
            acc: BytesMut::new(),
            decoder: RequestDecoder::new(),
            head: None,
            body: BytesMut::new(),
            encoder: ResponseEncoder::new(),
            write_buf: BytesMut::new(),
            router,
            config,
        }));
        Self::do_read(this);
    }

    fn do_read(this: Rc<RefCell<Self>>) {
        // an eager peer may have delivered the next request already
        let buffered = {
            let mut inner = this.borrow_mut();
            if inner.acc.is_empty() { Ok(false) } else { inner.advance_parser() }
        };
        match buffered {
            Ok(false) => {}
            Ok(true) => return Self::do_dispatch(this),
            Err(error) => {
                debug!(%error, "dropping connection after parse failure");
                return;
            }
        }

        let (conn, buf, idle_timeout) = {
            let mut inner = this.borrow_mut();
            let size = inner.config.read_buffer_size;
            let buf = inner.read_buf.take().unwrap_or_else(|| BytesMut::zeroed(size));
            (inner.conn.clone(), buf, inner.config.read_idle_timeout)
        };

        let stop_read = StopSource::new();
        let stop_timer = StopSource::new();
        let expire = stop_read.clone();
        Reactor::current().set_timeout(
            idle_timeout,
            Callback::new(move |_| expire.request_stop()),
            stop_timer.clone(),
        );

        conn.async_read(
            buf,
            Callback::new(move |(buf, result)| {
                // read finished first: the timer must become a no-op
                stop_timer.request_stop();
                Self::on_read(this, buf, result);
            }),
            stop_read,
        );
    }

    fn on_read(this: Rc<RefCell<Self>>, buf: BytesMut, result: io::Result<usize>) {
        let n = match result {
            Ok(0) => {
                trace!("peer closed connection");
                return;
            }
            Ok(n) => n,
            Err(error) if is_cancelled(&error) => {
                debug!("idle timeout, closing connection");
                return;
            }
            Err(error) => {
                debug!(%error, "read failed, closing connection");
                return;
            }
        };

        let step = {
            let mut inner = this.borrow_mut();
            inner.acc.extend_from_slice(&buf[..n]);
            inner.read_buf = Some(buf);
            match inner.advance_parser() {
                Ok(true) => Step::Dispatch,
                Ok(false) => Step::Read,
                Err(error) => {
                    debug!(%error, "dropping connection after parse failure");
                    Step::Close
                }
            }
        };

        match step {
            Step::Read => Self::do_read(this),
            Step::Dispatch => Self::do_dispatch(this),
            Step::Close => {}
        }
    }

    /// Feeds buffered bytes through the decoder. `Ok(true)` means a full
    /// request (head and body) is ready for dispatch.
    fn advance_parser(&mut self) -> Result<bool, HttpError> {
        loop {
            match self.decoder.decode(&mut self.acc)? {
                Some(Message::Header((head, _payload_size))) => {
                    self.head = Some(head);
                }
                Some(Message::Payload(PayloadItem::Chunk(chunk))) => {
                    self.body.extend_from_slice(&chunk);
                    ensure!(
                        self.body.len() <= self.config.max_body_size,
                        ParseError::too_large_body(self.body.len(), self.config.max_body_size).into()
                    );
                }
                Some(Message::Payload(PayloadItem::Eof)) => return Ok(true),
                None => return Ok(false),
            }
        }
    }

    fn do_dispatch(this: Rc<RefCell<Self>>) {
        let (request, router) = {
            let mut inner = this.borrow_mut();
            let Some(head) = inner.head.take() else {
                error!("dispatch without a framed request");
                return;
            };
            let body = inner.body.split().freeze();
            let router = inner.router.clone();
            (Request { head, body, responder: Responder { connection: Rc::clone(&this) } }, router)
        };
        router.dispatch(request);
    }

    fn do_write(this: Rc<RefCell<Self>>, buf: Bytes) {
        let conn = this.borrow().conn.clone();
        let remaining = buf.clone();
        conn.async_write(
            buf,
            Callback::new(move |result| {
                let n = match result {
                    Ok(n) => n,
                    Err(error) => {
                        debug!(%error, "write failed, closing connection");
                        return;
                    }
                };
                if n == remaining.len() {
                    trace!(bytes = n, "response flushed, reading next request");
                    Self::do_read(this);
                } else {
                    Self::do_write(this, remaining.slice(n..));
                }
            }),
            StopSource::inert(),
        );
    }
}

/// A fully framed request, handed to exactly one handler.
///
/// Responding consumes the request, so a handler can respond at most
/// once; dropping a request without responding abandons the connection
/// (the peer eventually gives up — there is deliberately no timeout on
/// the dispatch state).
pub struct Request {
    head: RequestHead,
    body: Bytes,
    responder: Responder,
}

impl Request {
    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn uri(&self) -> &Uri {
        self.head.uri()
    }

    /// The request-target exactly as the client sent it.
    pub fn target(&self) -> &str {
        self.head.target()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Responds with `text/plain;charset=utf-8` content.
    pub fn respond(self, status: StatusCode, body: impl Into<Bytes>) {
        self.respond_with(status, DEFAULT_CONTENT_TYPE, body)
    }

    /// Responds with an explicit content type.
    pub fn respond_with(self, status: StatusCode, content_type: &str, body: impl Into<Bytes>) {
        self.responder.send(status, content_type, body.into())
    }
}

/// The write side of a request: formats the response with the default
/// header set and resumes the connection's write path.
struct Responder {
    connection: Rc<RefCell<HttpConnection>>,
}

impl Responder {
    fn send(self, status: StatusCode, content_type: &str, body: Bytes) {
        let this = self.connection;
        match Self::encode_response(&this, status, content_type, body) {
            Ok(buffer) => HttpConnection::do_write(this, buffer),
            Err(error) => error!(%error, "failed to encode response, closing connection"),
        }
    }

    /// Formats the response into the connection's write buffer and takes
    /// the bytes, leaving the writer reset for the next response.
    fn encode_response(
        this: &Rc<RefCell<HttpConnection>>,
        status: StatusCode,
        content_type: &str,
        body: Bytes,
    ) -> Result<Bytes, HttpError> {
        let mut inner = this.borrow_mut();

        let content_type = HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let head = ResponseHead::new(status)
            .header(SERVER, HeaderValue::from_static(SERVER_NAME))
            .header(CONTENT_TYPE, content_type)
            .header(CONNECTION, HeaderValue::from_static("keep-alive"));

        let inner = &mut *inner;
        inner.encoder.encode((head, body), &mut inner.write_buf)?;
        Ok(inner.write_buf.split().freeze())
    }
}
