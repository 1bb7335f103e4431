//! CSRF lifecycle against a minimal in-process HTTP server: lazy token
//! fetch, exactly one refresh-and-retry on invalidation, and the fatal
//! second invalidation.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use adt_rs::{AuthMaterial, HttpTransport, RequestOptions, SystemEndpoint, Transport};

/// One canned HTTP response: (status, extra header lines, body).
#[derive(Clone)]
struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Canned {
    fn ok(body: &str) -> Canned {
        Canned {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn with_header(mut self, name: &str, value: &str) -> Canned {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn status(status: u16) -> Canned {
        Canned {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

/// A recorded request: the request line plus all header lines.
type RequestLog = Arc<Mutex<Vec<String>>>;

/// Serve scripted responses, one connection per request
/// (`Connection: close`). Returns the base URL and the request log.
async fn spawn_http_server(mut script: Vec<Canned>) -> (String, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let server_log = log.clone();
    script.reverse();
    let script = Arc::new(Mutex::new(script));

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buffer = Vec::new();
            let mut chunk = [0u8; 4096];
            let request = loop {
                let Ok(n) = stream.read(&mut chunk).await else {
                    break None;
                };
                if n == 0 {
                    break None;
                }
                buffer.extend_from_slice(&chunk[..n]);
                if let Some(header_end) = find(&buffer, b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
                    let content_length = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if buffer.len() >= header_end + 4 + content_length {
                        break Some(head);
                    }
                }
            };
            let Some(head) = request else { continue };
            server_log.lock().unwrap().push(head);

            let canned = script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Canned::status(500));
            let mut response = format!("HTTP/1.1 {} X\r\n", canned.status);
            for (name, value) in &canned.headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str(&format!(
                "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                canned.body.len(),
                canned.body
            ));
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{addr}"), log)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn transport_for(base_url: &str) -> HttpTransport {
    let endpoint = SystemEndpoint::new(
        base_url,
        "001",
        "EN",
        false,
        AuthMaterial::Basic {
            username: "DEVELOPER".into(),
            password: "secret".into(),
        },
    )
    .unwrap();
    HttpTransport::new(&endpoint).unwrap()
}

fn header_of(log: &RequestLog, index: usize, header: &str) -> Option<String> {
    let entries = log.lock().unwrap();
    let head = entries.get(index)?;
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case(header)
            .then(|| value.trim().to_string())
    })
}

#[tokio::test]
async fn get_requests_skip_the_csrf_handshake() {
    let (base_url, log) = spawn_http_server(vec![Canned::ok("REPORT ztest.")]).await;
    let transport = transport_for(&base_url);

    let response = transport
        .request(
            "/sap/bc/adt/programs/programs/ztest/source/main",
            RequestOptions::get(),
        )
        .await
        .unwrap();
    assert_eq!(response.body, "REPORT ztest.");

    let entries = log.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("GET /sap/bc/adt/programs"));
    assert!(entries[0].to_ascii_lowercase().contains("authorization: basic"));
}

#[tokio::test]
async fn first_mutating_request_fetches_the_token_once() {
    let (base_url, log) = spawn_http_server(vec![
        Canned::ok("").with_header("x-csrf-token", "TOK1"),
        Canned::ok("saved"),
        Canned::ok("saved again"),
    ])
    .await;
    let transport = transport_for(&base_url);

    transport
        .request(
            "/sap/bc/adt/programs/programs/ztest/source/main",
            RequestOptions::put().body("REPORT ztest."),
        )
        .await
        .unwrap();
    transport
        .request(
            "/sap/bc/adt/programs/programs/ztest/source/main",
            RequestOptions::put().body("REPORT ztest. \" v2"),
        )
        .await
        .unwrap();

    let entries = log.lock().unwrap().clone();
    // One discovery fetch, then two PUTs reusing the cached token.
    assert_eq!(entries.len(), 3);
    assert!(entries[0].starts_with("GET /sap/bc/adt/discovery"));
    assert_eq!(header_of(&log, 0, "x-csrf-token").as_deref(), Some("fetch"));
    assert!(entries[1].starts_with("PUT "));
    assert_eq!(header_of(&log, 1, "x-csrf-token").as_deref(), Some("TOK1"));
    assert_eq!(header_of(&log, 2, "x-csrf-token").as_deref(), Some("TOK1"));
}

#[tokio::test]
async fn csrf_invalidation_refreshes_and_retries_exactly_once() {
    let (base_url, log) = spawn_http_server(vec![
        Canned::ok("").with_header("x-csrf-token", "TOK1"),
        Canned::status(403).with_header("x-csrf-token", "Required"),
        Canned::ok("").with_header("x-csrf-token", "TOK2"),
        Canned::ok("saved"),
    ])
    .await;
    let transport = transport_for(&base_url);

    let response = transport
        .request(
            "/sap/bc/adt/programs/programs/ztest/source/main",
            RequestOptions::put().body("REPORT ztest."),
        )
        .await
        .unwrap();
    assert_eq!(response.body, "saved");

    let entries = log.lock().unwrap().clone();
    assert_eq!(entries.len(), 4);
    assert!(entries[0].starts_with("GET /sap/bc/adt/discovery"));
    assert!(entries[1].starts_with("PUT "));
    assert!(entries[2].starts_with("GET /sap/bc/adt/discovery"));
    assert!(entries[3].starts_with("PUT "));
    assert_eq!(header_of(&log, 3, "x-csrf-token").as_deref(), Some("TOK2"));
}

#[tokio::test]
async fn second_invalidation_in_one_request_is_auth_failed() {
    let (base_url, log) = spawn_http_server(vec![
        Canned::ok("").with_header("x-csrf-token", "TOK1"),
        Canned::status(403).with_header("x-csrf-token", "Required"),
        Canned::ok("").with_header("x-csrf-token", "TOK2"),
        Canned::status(403).with_header("x-csrf-token", "Required"),
    ])
    .await;
    let transport = transport_for(&base_url);

    let err = transport
        .request(
            "/sap/bc/adt/programs/programs/ztest/source/main",
            RequestOptions::put().body("REPORT ztest."),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "auth-failed");

    // fetch, put, refetch, retry - and nothing after the second rejection.
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn plain_403_is_auth_failed_without_retry() {
    let (base_url, log) = spawn_http_server(vec![
        Canned::ok("").with_header("x-csrf-token", "TOK1"),
        Canned::status(403),
    ])
    .await;
    let transport = transport_for(&base_url);

    let err = transport
        .request(
            "/sap/bc/adt/programs/programs/ztest/source/main",
            RequestOptions::put().body("REPORT ztest."),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "auth-failed");
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn conflict_texts_are_preserved_for_substring_matching() {
    let (base_url, _log) = spawn_http_server(vec![
        Canned::ok("").with_header("x-csrf-token", "TOK1"),
        Canned {
            status: 400,
            headers: Vec::new(),
            body: "ExceptionObjectAlreadyExists: object ZX already exists".into(),
        },
    ])
    .await;
    let transport = transport_for(&base_url);

    let err = transport
        .request("/sap/bc/adt/oo/classes", RequestOptions::post().body("<x/>"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "already-exists");
    assert!(err.to_string().contains("AlreadyExists"));
}
