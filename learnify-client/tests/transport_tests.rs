//! HTTP transport against a minimal local server.

use std::sync::Arc;
use std::time::Duration;

use learnify_client::{HttpTransport, Method, StaticTokenProvider, TokenProvider, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Read headers and a `content-length` body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                return text;
            }
        }
    }
    String::from_utf8_lossy(&raw).to_string()
}

/// Serve one canned HTTP response and hand back the raw request.
async fn serve_once(status_line: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn test_success_sends_bearer_token() {
    let (base, server) = serve_once("200 OK", r#"[{"id":"1"}]"#).await;
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::new("abc"));
    let transport = HttpTransport::new(Duration::from_secs(5), Some(tokens)).unwrap();

    let response = transport
        .perform(Method::Get, &format!("{base}/categories"), None)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body[0]["id"], "1");
    let request = server.await.unwrap().to_lowercase();
    assert!(request.starts_with("get /categories"));
    assert!(request.contains("authorization: bearer abc"));
}

#[tokio::test]
async fn test_unauthorized_clears_tokens() {
    let (base, server) = serve_once("401 Unauthorized", r#"{"detail":"Token expired"}"#).await;
    let tokens = Arc::new(StaticTokenProvider::new("stale"));
    let transport =
        HttpTransport::new(Duration::from_secs(5), Some(tokens.clone() as Arc<dyn TokenProvider>))
            .unwrap();

    let err = transport
        .perform(Method::Get, &format!("{base}/auth/profile"), None)
        .await
        .unwrap_err();
    server.await.unwrap();

    assert_eq!(err.http_status(), Some(401));
    assert_eq!(tokens.current_token(), None);
    let api = learnify_core::ApiError::from(err);
    assert_eq!(api.message, "Token expired");
    assert_eq!(api.detail.as_deref(), Some("Token expired"));
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let (base, server) = serve_once("200 OK", r#"{"message":"ok"}"#).await;
    let transport = HttpTransport::new(Duration::from_secs(5), None).unwrap();
    let body = serde_json::json!({"lesson_id": "l1", "course_id": "1"});

    transport
        .perform(Method::Post, &format!("{base}/progress/lesson"), Some(&body))
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /progress/lesson"));
    assert!(request.contains(r#""lesson_id":"l1""#));
}
