use arp_gateway::{AtomicExecutorGateway, NodeRegistryGateway};
use arp_model::{AtomicExecuteRequest, NodeTypeRef};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn serve_once(status_line: &'static str, body: &'static str) -> String {
    serve_once_recording(status_line, body).await.0
}

/// Answers one request and reports its request line.
async fn serve_once_recording(
    status_line: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("local addr should resolve");
    let (request_line_tx, request_line_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept should succeed");
        let mut buffer = vec![0_u8; 8192];
        let read = socket.read(&mut buffer).await.unwrap_or(0);
        let request = String::from_utf8_lossy(&buffer[..read]);
        let _ = request_line_tx.send(request.lines().next().unwrap_or_default().to_string());
        let response = format!(
            "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("response should be written");
        let _ = socket.shutdown().await;
    });
    (format!("http://{address}"), request_line_rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_refused_expected_atomic_executor_unavailable() {
    let gateway = AtomicExecutorGateway::http("http://127.0.0.1:1");

    let error = gateway
        .execute_atomic_node_run(AtomicExecuteRequest {
            node_run_id: "node_run_1".to_string(),
            run_id: "run_1".to_string(),
            node_type_ref: NodeTypeRef::new("jarvis.core.echo", "0.3.7"),
            inputs: json!({}),
            extensions: None,
        })
        .await
        .expect_err("unreachable executor should fail");

    assert_eq!(error.code, "atomic_executor_unavailable");
    assert_eq!(error.status_code, 502);
    let details = error.details.expect("details should be present");
    assert_eq!(
        details.get("atomic_executor_url"),
        Some(&json!("http://127.0.0.1:1"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn error_envelope_response_expected_api_error_with_status() {
    let base_url = serve_once(
        "HTTP/1.1 409 Conflict",
        r#"{"error":{"code":"node_type_conflict","message":"version mismatch","details":{"expected":"0.3.7"}}}"#,
    )
    .await;
    let gateway = NodeRegistryGateway::http(base_url);

    let error = gateway
        .get_node_type(NodeTypeRef::new("jarvis.core.echo", "0.3.7"))
        .await
        .expect_err("conflict should surface");

    assert_eq!(error.code, "node_type_conflict");
    assert_eq!(error.message, "version mismatch");
    assert_eq!(error.status_code, 409);
    assert_eq!(
        error
            .details
            .and_then(|details| details.get("expected").cloned()),
        Some(json!("0.3.7"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn success_response_expected_decoded_payload() {
    let base_url = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"node_type_ref":{"node_type_id":"jarvis.core.echo","version":"0.3.7"},"kind":"atomic"}"#,
    )
    .await;
    let gateway = NodeRegistryGateway::http(base_url);

    let node_type = gateway
        .get_node_type(NodeTypeRef::new("jarvis.core.echo", "0.3.7"))
        .await
        .expect("lookup should succeed");

    assert_eq!(node_type.kind.as_deref(), Some("atomic"));
}

#[tokio::test(flavor = "multi_thread")]
async fn html_error_page_expected_atomic_executor_unavailable() {
    let base_url = serve_once("HTTP/1.1 502 Bad Gateway", "<html>Bad Gateway</html>").await;
    let gateway = AtomicExecutorGateway::http(base_url.clone());

    let error = gateway
        .health()
        .await
        .expect_err("proxy error page should fail");

    assert_eq!(error.code, "atomic_executor_unavailable");
    assert_eq!(error.message, "Atomic Executor request failed");
    assert_eq!(error.status_code, 502);
    let details = error.details.expect("details should be present");
    assert_eq!(details.get("atomic_executor_url"), Some(&json!(base_url)));
    let failure = details
        .get("error")
        .and_then(|value| value.as_str())
        .expect("failure should be a string");
    assert!(failure.contains("<html>Bad Gateway</html>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn node_type_id_with_reserved_characters_expected_single_encoded_segment() {
    let (base_url, request_line) = serve_once_recording(
        "HTTP/1.1 200 OK",
        r#"{"node_type_ref":{"node_type_id":"team/echo#1","version":"0.3.7"}}"#,
    )
    .await;
    let gateway = NodeRegistryGateway::http(base_url);

    gateway
        .get_node_type(NodeTypeRef::new("team/echo#1", "0.3.7"))
        .await
        .expect("lookup should succeed");

    let request_line = request_line.await.expect("request line should be recorded");
    assert!(
        request_line.starts_with("GET /v1/node-types/team%2Fecho%231?version=0.3.7 "),
        "unexpected request line: {request_line}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_node_run_id_with_slash_expected_encoded_segment() {
    let (base_url, request_line) = serve_once_recording("HTTP/1.1 204 No Content", "").await;
    let gateway = AtomicExecutorGateway::http(base_url);

    gateway
        .cancel_atomic_node_run("node_run/1")
        .await
        .expect("cancel should succeed");

    let request_line = request_line.await.expect("request line should be recorded");
    assert!(
        request_line.starts_with("POST /v1/atomic-node-runs/node_run%2F1:cancel "),
        "unexpected request line: {request_line}"
    );
}
