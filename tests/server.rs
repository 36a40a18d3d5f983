//! End-to-end tests: a real client and server sharing one reactor.
//!
//! The client side is driven with the same continuation primitives as the
//! server, so a whole exchange — connect, write, read, keep-alive, close,
//! shutdown — runs deterministically inside a single `Reactor::run`.

use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::StatusCode;

use co_http::runtime::{stream, AsyncFd, Callback, Reactor, StopSource};
use co_http::{Request, Router, Server, ServerConfig};

struct Client {
    fd: AsyncFd,
    requests: Vec<&'static str>,
    next: usize,
    collected: Vec<u8>,
    responses: Rc<RefCell<Vec<Vec<u8>>>>,
    on_done: Option<Box<dyn FnOnce()>>,
}

/// Connects to `addr`, performs each request in order on one connection,
/// records the raw responses, then runs `on_done` and closes.
fn start_client(
    addr: SocketAddr,
    requests: Vec<&'static str>,
    responses: Rc<RefCell<Vec<Vec<u8>>>>,
    on_done: impl FnOnce() + 'static,
) {
    let socket = stream(addr).expect("client socket");
    let fd = AsyncFd::new(socket).expect("client registration");
    let client = Rc::new(RefCell::new(Client {
        fd: fd.clone(),
        requests,
        next: 0,
        collected: Vec::new(),
        responses,
        on_done: Some(Box::new(on_done)),
    }));
    fd.async_connect(
        addr.into(),
        Callback::new(move |result: std::io::Result<()>| {
            result.expect("connect");
            send_next(client);
        }),
        StopSource::inert(),
    );
}

fn send_next(client: Rc<RefCell<Client>>) {
    let (fd, request) = {
        let mut state = client.borrow_mut();
        if state.next >= state.requests.len() {
            let done = state.on_done.take().expect("client finished twice");
            drop(state);
            done();
            return;
        }
        let request = Bytes::from_static(state.requests[state.next].as_bytes());
        state.next += 1;
        (state.fd.clone(), request)
    };
    write_all(client, fd, request);
}

fn write_all(client: Rc<RefCell<Client>>, fd: AsyncFd, buf: Bytes) {
    let remaining = buf.clone();
    let again = fd.clone();
    fd.async_write(
        buf,
        Callback::new(move |result: std::io::Result<usize>| {
            let n = result.expect("write");
            if n == remaining.len() {
                read_response(client);
            } else {
                write_all(client, again, remaining.slice(n..));
            }
        }),
        StopSource::inert(),
    );
}

fn read_response(client: Rc<RefCell<Client>>) {
    let fd = client.borrow().fd.clone();
    fd.async_read(
        BytesMut::zeroed(512),
        Callback::new(move |(buf, result): (BytesMut, std::io::Result<usize>)| {
            let n = result.expect("read");
            assert!(n > 0, "server closed before a full response arrived");
            let complete = {
                let mut state = client.borrow_mut();
                state.collected.extend_from_slice(&buf[..n]);
                response_len(&state.collected).filter(|len| state.collected.len() >= *len)
            };
            match complete {
                Some(len) => {
                    {
                        let mut state = client.borrow_mut();
                        let rest = state.collected.split_off(len);
                        let response = std::mem::replace(&mut state.collected, rest);
                        state.responses.borrow_mut().push(response);
                    }
                    send_next(client);
                }
                None => read_response(client),
            }
        }),
        StopSource::inert(),
    );
}

/// Total wire length of the response at the front of `bytes`, once its
/// header block has fully arrived.
fn response_len(bytes: &[u8]) -> Option<usize> {
    let header_end = bytes.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = std::str::from_utf8(&bytes[..header_end]).ok()?;
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(header_end + content_length)
}

fn echo_router() -> Router {
    let mut router = Router::new();
    router.route("/echo", |request: Request| {
        let body = request.body().clone();
        request.respond(StatusCode::OK, body);
    });
    router
}

fn contains_header(response: &str, name: &str, value: &str) -> bool {
    response
        .lines()
        .filter_map(|line| line.split_once(':'))
        .any(|(n, v)| n.eq_ignore_ascii_case(name) && v.trim() == value)
}

#[test]
fn echoes_a_request_body() {
    let reactor = Reactor::new().unwrap();
    let handle = Server::new(echo_router()).start("127.0.0.1", "0").unwrap();
    let addr = handle.local_addr();

    let responses = Rc::new(RefCell::new(Vec::new()));
    start_client(
        addr,
        vec!["GET /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello"],
        responses.clone(),
        move || handle.shutdown(),
    );

    reactor.run().unwrap();
    assert!(reactor.is_empty());
    assert_eq!(reactor.pending_count(), 0);

    let responses = responses.borrow();
    assert_eq!(responses.len(), 1);
    let response = std::str::from_utf8(&responses[0]).unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(contains_header(response, "server", "co_http"), "{response}");
    assert!(contains_header(response, "content-type", "text/plain;charset=utf-8"), "{response}");
    assert!(contains_header(response, "connection", "keep-alive"), "{response}");
    assert!(contains_header(response, "content-length", "5"), "{response}");
    assert!(response.ends_with("\r\n\r\nhello"), "{response}");
}

#[test]
fn keeps_the_connection_alive_across_requests() {
    let reactor = Reactor::new().unwrap();
    let handle = Server::new(echo_router()).start("127.0.0.1", "0").unwrap();
    let addr = handle.local_addr();

    let responses = Rc::new(RefCell::new(Vec::new()));
    start_client(
        addr,
        vec![
            "GET /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nfirst",
            "GET /echo HTTP/1.1\r\nContent-Length: 6\r\n\r\nsecond",
        ],
        responses.clone(),
        move || handle.shutdown(),
    );

    reactor.run().unwrap();

    let responses = responses.borrow();
    assert_eq!(responses.len(), 2);
    assert!(responses[0].ends_with(b"first"));
    assert!(responses[1].ends_with(b"second"));
}

#[test]
fn unrouted_target_gets_a_404() {
    let reactor = Reactor::new().unwrap();
    let handle = Server::new(echo_router()).start("127.0.0.1", "0").unwrap();
    let addr = handle.local_addr();

    let responses = Rc::new(RefCell::new(Vec::new()));
    start_client(
        addr,
        vec!["GET /missing HTTP/1.1\r\nHost: x\r\n\r\n"],
        responses.clone(),
        move || handle.shutdown(),
    );

    reactor.run().unwrap();

    let responses = responses.borrow();
    let response = std::str::from_utf8(&responses[0]).unwrap();
    assert!(response.starts_with("HTTP/1.1 404 "), "{response}");
    assert!(contains_header(response, "content-length", "13"), "{response}");
    assert!(response.ends_with("\r\n\r\n404 Not Found"), "{response}");
}

#[test]
fn large_responses_survive_partial_writes() {
    const BODY_LEN: usize = 1024 * 1024;

    let reactor = Reactor::new().unwrap();
    let mut router = Router::new();
    router.route("/big", |request: Request| {
        request.respond(StatusCode::OK, Bytes::from(vec![b'x'; BODY_LEN]));
    });
    let handle = Server::new(router).start("127.0.0.1", "0").unwrap();
    let addr = handle.local_addr();

    let responses = Rc::new(RefCell::new(Vec::new()));
    start_client(
        addr,
        vec!["GET /big HTTP/1.1\r\nHost: x\r\n\r\n"],
        responses.clone(),
        move || handle.shutdown(),
    );

    reactor.run().unwrap();

    let responses = responses.borrow();
    assert_eq!(responses.len(), 1);
    let header_end = response_len(&responses[0]).unwrap() - BODY_LEN;
    let body = &responses[0][header_end..];
    assert_eq!(body.len(), BODY_LEN);
    assert!(body.iter().all(|&b| b == b'x'));
}

#[test]
fn idle_connections_are_closed_by_the_server() {
    let reactor = Reactor::new().unwrap();
    let config = ServerConfig { read_idle_timeout: Duration::from_millis(50), ..Default::default() };
    let handle = Server::with_config(Router::new(), config).start("127.0.0.1", "0").unwrap();
    let addr = handle.local_addr();

    let observed = Rc::new(Cell::new(None));
    let sink = observed.clone();
    let socket = stream(addr).unwrap();
    let fd = AsyncFd::new(socket).unwrap();
    let reader = fd.clone();
    fd.async_connect(
        addr.into(),
        Callback::new(move |result: std::io::Result<()>| {
            result.expect("connect");
            // send nothing; the server should give up and close
            reader.async_read(
                BytesMut::zeroed(64),
                Callback::new(move |(_buf, result): (BytesMut, std::io::Result<usize>)| {
                    sink.set(Some(result.expect("read")));
                    handle.shutdown();
                }),
                StopSource::inert(),
            );
        }),
        StopSource::inert(),
    );

    reactor.run().unwrap();
    assert_eq!(observed.get(), Some(0), "expected EOF with no response bytes");
}
