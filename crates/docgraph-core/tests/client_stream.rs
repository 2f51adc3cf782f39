use std::time::Duration;

use docgraph_core::driver::run_command;
use docgraph_core::{
    ApiClient, ApiError, ChatRole, FileSelection, Session, StreamFrame, UploadFailure,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Serve a single HTTP exchange, writing `parts` one at a time with a pause in
/// between so the client sees separate reads. Resolves to the raw request.
async fn serve_once(parts: Vec<Vec<u8>>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        for part in parts {
            socket.write_all(&part).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{}/api", addr), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let body_len = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + body_len {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn head(status: &str, content_type: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        status, content_type
    )
    .into_bytes()
}

fn json_response(status: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
    .into_bytes()
}

#[tokio::test]
async fn test_frames_split_across_reads_are_reassembled() {
    let (base_url, server) = serve_once(vec![
        head("200 OK", "text/event-stream"),
        b"data: {\"chu".to_vec(),
        b"nk\": \"Hel\"}\n\nda".to_vec(),
        b"ta: {\"chunk\": \"lo\"}\n\n".to_vec(),
        b"data: not json\n\n".to_vec(),
        b"data: {\"context\": \"page 3\"}".to_vec(),
    ])
    .await;

    let client = ApiClient::new(&base_url);
    let mut stream = client.query("hello?").await.unwrap();
    let mut frames = Vec::new();
    while let Some(frame) = stream.next_frame().await.unwrap() {
        frames.push(frame);
    }

    assert_eq!(
        frames,
        vec![
            StreamFrame::Chunk("Hel".to_string()),
            StreamFrame::Chunk("lo".to_string()),
            StreamFrame::Context("page 3".to_string()),
        ]
    );

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/query "));
    assert!(request.contains(r#"{"text":"hello?"}"#));
}

#[tokio::test]
async fn test_json_answer_becomes_single_chunk() {
    let (base_url, _server) = serve_once(vec![json_response(
        "200 OK",
        r#"{"response": "No relevant information found."}"#,
    )])
    .await;

    let client = ApiClient::new(&base_url);
    let mut stream = client.query("anything?").await.unwrap();
    assert_eq!(
        stream.next_frame().await.unwrap(),
        Some(StreamFrame::Chunk("No relevant information found.".to_string()))
    );
    assert_eq!(stream.next_frame().await.unwrap(), None);
}

#[tokio::test]
async fn test_error_detail_is_extracted() {
    let (base_url, _server) = serve_once(vec![json_response(
        "500 Internal Server Error",
        r#"{"detail": "embedding service unavailable"}"#,
    )])
    .await;

    let client = ApiClient::new(&base_url);
    let err = client.graph().await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected { .. }));
    assert_eq!(err.to_string(), "embedding service unavailable");
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
}

#[tokio::test]
async fn test_bare_status_without_body() {
    let (base_url, _server) = serve_once(vec![
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
    ])
    .await;

    let client = ApiClient::new(&base_url);
    let err = client.health().await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP error! status: 404");
}

#[tokio::test]
async fn test_graph_snapshot_is_fetched() {
    let (base_url, server) = serve_once(vec![json_response(
        "200 OK",
        r#"{"nodes": [{"id": "d1", "label": "report.pdf", "type": "Document", "properties": {}},
                      {"id": "c1", "label": "Chunk 1", "type": "Chunk", "properties": {}}],
            "relationships": [{"startNode": "d1", "endNode": "c1", "type": "CONTAINS", "properties": {}}]}"#,
    )])
    .await;

    let client = ApiClient::new(&base_url);
    let snapshot = client.graph().await.unwrap();
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.edges[0].kind, "CONTAINS");

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/graph "));
}

fn pdf_on_disk(dir: &tempfile::TempDir) -> FileSelection {
    let path = dir.path().join("report.pdf");
    std::fs::write(&path, b"%PDF-1.4 quarterly figures").unwrap();
    FileSelection::from_path(&path).unwrap().check().unwrap()
}

#[tokio::test]
async fn test_upload_sends_multipart_file_field() {
    let (base_url, server) = serve_once(vec![json_response(
        "200 OK",
        r#"{"message": "Document processed", "doc_id": "doc-42"}"#,
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let file = pdf_on_disk(&dir);
    assert_eq!(file.media_type, "application/pdf");

    let client = ApiClient::new(&base_url);
    let receipt = client.upload_document(&file).await.unwrap();
    assert_eq!(receipt.message.as_deref(), Some("Document processed"));
    assert_eq!(receipt.doc_id.as_deref(), Some("doc-42"));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/documents "));
    assert!(request.contains("name=\"file\""));
    assert!(request.contains("filename=\"report.pdf\""));
    assert!(request.contains("Content-Type: application/pdf"));
    assert!(request.contains("%PDF-1.4 quarterly figures"));
}

#[tokio::test]
async fn test_upload_rejection_is_classified() {
    let (base_url, _server) = serve_once(vec![json_response(
        "500 Internal Server Error",
        r#"{"detail": "No text content could be extracted"}"#,
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let file = pdf_on_disk(&dir);

    let client = ApiClient::new(&base_url);
    let err = client.upload_document(&file).await.unwrap_err();
    assert_eq!(UploadFailure::classify(&err), UploadFailure::NoExtractableText);
}

#[tokio::test]
async fn test_session_answer_through_driver() {
    let (base_url, _server) = serve_once(vec![
        head("200 OK", "text/event-stream"),
        b"data: {\"chunk\": \"Hel\"}\n".to_vec(),
        b"\ndata: {\"chunk\": \"lo\"}\n\n".to_vec(),
    ])
    .await;

    let client = ApiClient::new(&base_url);
    let mut session = Session::new(Duration::from_millis(100), true);
    let command = session.send("say hello").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    run_command(&client, command, tx).await;
    while let Some(event) = rx.recv().await {
        assert!(session.handle(event).is_empty());
    }

    let entries = session.transcript().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].role, ChatRole::Assistant);
    assert_eq!(entries[1].content, "Hello");
    assert!(!session.is_processing());
}
