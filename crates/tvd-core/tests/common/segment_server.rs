//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed map of path -> body for GET. Unknown paths get 404. Every
//! raw request head is recorded so tests can assert on sent headers.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SegmentServerOptions {
    /// Per-path delay before responding.
    pub delays: HashMap<String, Duration>,
    /// Per-path status override (body is empty).
    pub statuses: HashMap<String, u16>,
}

pub struct SegmentServer {
    /// e.g. "http://127.0.0.1:12345/"
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl SegmentServer {
    /// Raw request heads received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(bodies: HashMap<String, Vec<u8>>) -> SegmentServer {
    start_with_options(bodies, SegmentServerOptions::default())
}

pub fn start_with_options(
    bodies: HashMap<String, Vec<u8>>,
    opts: SegmentServerOptions,
) -> SegmentServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let bodies = Arc::new(bodies);
    let opts = Arc::new(opts);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let bodies = Arc::clone(&bodies);
            let opts = Arc::clone(&opts);
            let log = Arc::clone(&log);
            thread::spawn(move || handle(stream, &bodies, &opts, &log));
        }
    });
    SegmentServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

fn handle(
    mut stream: TcpStream,
    bodies: &HashMap<String, Vec<u8>>,
    opts: &SegmentServerOptions,
    log: &Mutex<Vec<String>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&buf).into_owned();
    log.lock().unwrap().push(request.clone());

    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/").trim_start_matches('/').to_string();

    if let Some(delay) = opts.delays.get(&path) {
        thread::sleep(*delay);
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(
            b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }
    let (status, body): (String, &[u8]) = match (opts.statuses.get(&path), bodies.get(&path)) {
        (Some(code), _) => (format!("{} Status", code), &[]),
        (None, Some(body)) => ("200 OK".to_string(), body.as_slice()),
        (None, None) => ("404 Not Found".to_string(), &[]),
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: video/mp2t\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}
