//! Loopback HTTP listeners for adapter tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let endpoint = format!(
        "http://{}",
        listener.local_addr().expect("listener address")
    );
    (listener, endpoint)
}

fn read_request_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buffer = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(read) => head.extend_from_slice(&buffer[..read]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Answers exactly one request with `status_line` and an empty body.
/// Returns the endpoint and a handle yielding the request head.
pub fn one_shot(status_line: &'static str) -> (String, thread::JoinHandle<String>) {
    let (listener, endpoint) = bind();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let head = read_request_head(&mut stream);
        let response = format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        stream
            .write_all(response.as_bytes())
            .expect("write response");
        head
    });
    (endpoint, handle)
}

/// Accepts connections and never answers them.
pub fn hanging() -> String {
    let (listener, endpoint) = bind();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    endpoint
}
