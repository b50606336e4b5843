//! Notion client against a local one-shot HTTP responder.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use notion_blocks::{NotionClient, NotionConfig};
use spec_mirror_core::{ApiKey, BlockUpdate, DocumentStore, RichTextRun, StoreError};

/// Serve a single request with `status` and `body`; resolves to the raw
/// request text.
async fn respond_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            if n == 0 || request_complete(&raw) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&raw).into_owned()
    });

    (base, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= header_end + 4 + content_length
}

fn client(base: &str) -> NotionClient {
    NotionClient::new(NotionConfig::new(ApiKey::new("secret_abc")).with_api_base(base)).unwrap()
}

#[tokio::test]
async fn lists_children_over_http() {
    let (base, server) = respond_once(
        "200 OK",
        r#"{"object":"list","results":[{"object":"block","id":"X1","type":"to_do","to_do":{"rich_text":[{"plain_text":"Add retry logic","href":null}],"checked":false}}],"has_more":false}"#,
    )
    .await;

    let blocks = client(&base).list_children("page123").await.unwrap();

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].plain_text(), "Add retry logic");

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /v1/blocks/page123/children?page_size=100 HTTP/1.1"));
    assert!(request.to_lowercase().contains("notion-version: 2022-06-28"));
}

#[tokio::test]
async fn listing_error_status_is_reported() {
    let (base, server) = respond_once(
        "401 Unauthorized",
        r#"{"object":"error","status":401,"code":"unauthorized","message":"API token is invalid."}"#,
    )
    .await;

    let err = client(&base).list_children("page123").await.unwrap_err();

    match err {
        StoreError::Status { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("API token is invalid"));
        }
        other => panic!("Expected Status, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn update_sends_patch_with_checked_flag() {
    let (base, server) = respond_once("200 OK", r#"{"object":"block","id":"X1"}"#).await;
    let update = BlockUpdate::Checkbox {
        rich_text: vec![RichTextRun::plain("Add retry logic")],
        checked: true,
    };

    client(&base).update_block("X1", &update).await.unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("PATCH /v1/blocks/X1 HTTP/1.1"));
    assert!(request.contains(r#""checked":true"#));
}

#[tokio::test]
async fn update_of_missing_block_is_not_found() {
    let (base, server) = respond_once(
        "404 Not Found",
        r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find block"}"#,
    )
    .await;
    let update = BlockUpdate::Checkbox {
        rich_text: vec![],
        checked: true,
    };

    let err = client(&base).update_block("X9", &update).await.unwrap_err();

    assert!(matches!(err, StoreError::BlockNotFound { ref block_id } if block_id == "X9"));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&base).list_children("page123").await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));
}
