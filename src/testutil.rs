//! Loopback HTTP server for exercising the real HTTP clients in tests.

use std::thread::{self, JoinHandle};
use tiny_http::{Header, Response, Server};

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// Answers requests with the canned `(status, body)` pairs, in order, then stops.
/// Every response is labelled `application/json`.
pub struct LoopbackServer {
    port: u16,
    handle: JoinHandle<Vec<SeenRequest>>,
}

impl LoopbackServer {
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind loopback server");
        let port = server.server_addr().port();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let mut request = match server.recv() {
                    Ok(r) => r,
                    Err(_) => break,
                };

                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_string())
                };
                let authorization = header("Authorization");
                let content_type = header("Content-Type");

                let mut text = String::new();
                let _ = request.as_reader().read_to_string(&mut text);

                seen.push(SeenRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization,
                    content_type,
                    body: text,
                });

                let json = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .expect("static header");
                let response = Response::from_data(body.into_bytes())
                    .with_status_code(status)
                    .with_header(json);
                let _ = request.respond(response);
            }
            seen
        });

        Self { port, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Waits until every canned response was served and returns what was received.
    pub fn finish(self) -> Vec<SeenRequest> {
        self.handle.join().expect("loopback server thread panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_headers_regardless_of_case() {
        let server = LoopbackServer::start(vec![(204, String::new())]);
        let resp = reqwest::blocking::Client::new()
            .post(format!("{}/hook?x=1", server.base_url()))
            .header("authorization", "Bearer abc")
            .header("content-type", "application/json")
            .body("{}")
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);

        let seen = server.finish();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].url, "/hook?x=1");
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer abc"));
        assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(seen[0].body, "{}");
    }
}
