//! Demo server: a tiny message board.
//!
//! ```bash
//! cargo run
//! curl http://127.0.0.1:8080/
//! curl -d "hello from curl" http://127.0.0.1:8080/send
//! curl http://127.0.0.1:8080/recv
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use http::StatusCode;
use tracing::info;

use co_http::{Reactor, Request, Router, Server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let reactor = Reactor::new()?;

    let messages = Rc::new(RefCell::new(String::new()));

    let mut router = Router::new();
    router.route("/", |request: Request| {
        request.respond_with(StatusCode::OK, "text/html;charset=utf-8", "<h1>co_http</h1>");
    });
    router.route("/echo", |request: Request| {
        let body = request.body().clone();
        request.respond(StatusCode::OK, body);
    });

    let sink = messages.clone();
    router.route("/send", move |request: Request| {
        let mut list = sink.borrow_mut();
        list.push_str(&String::from_utf8_lossy(request.body()));
        list.push('\n');
        drop(list);
        request.respond(StatusCode::OK, "msg get");
    });

    let source = messages.clone();
    router.route("/recv", move |request: Request| {
        let list = source.borrow().clone();
        request.respond(StatusCode::OK, list);
    });

    let handle = Server::new(router).start("127.0.0.1", "8080")?;
    info!(addr = %handle.local_addr(), "serving");

    reactor.run()?;
    Ok(())
}
