//! A scripted HTTP backend on a loopback port.
//!
//! Queued responses answer successive requests in order; the server thread
//! stops once every response has been served.

#![allow(dead_code)]

use std::io::Read;
use std::thread::{self, JoinHandle};

use tiny_http::{Header, Response, Server};

/// One request as the server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub struct Backend {
    pub base_url: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl Backend {
    /// Wait for every queued response to be served and return the requests
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().unwrap()
    }
}

/// Serve `responses` (status, body) to successive requests.
pub fn serve(responses: Vec<(u16, String)>) -> Backend {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let base_url = format!("http://{}", addr);
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let mut request = server.recv().unwrap();
            let mut raw = String::new();
            request.as_reader().read_to_string(&mut raw).unwrap();
            seen.push(Recorded {
                method: request.method().to_string(),
                path: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect(),
                body: raw,
            });

            let content_type: Header = "Content-Type: application/json".parse().unwrap();
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(content_type);
            request.respond(response).unwrap();
        }
        seen
    });
    Backend { base_url, handle }
}

/// Wrap `data` in the backend's success envelope
pub fn envelope(data: serde_json::Value) -> String {
    serde_json::json!({ "success": true, "message": "ok", "data": data }).to_string()
}
