//! IPC integration tests: a real Unix socket server, MessagePack frames with
//! a 4-byte little-endian length prefix.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tubesum_core::generator::{GeminiSummaryClient, GeneratorConfig};
use tubesum_core::ipc::{decode_frame, encode_frame, ErrorKind, TubesumRequest, TubesumResponse};
use tubesum_core::kv::MemoryKvStore;
use tubesum_core::models::{Concept, SummaryResult};
use tubesum_core::store::SummaryStore;
use tubesum_core::TubesumConfig;
use tubesum_server::router::RouterState;
use tubesum_server::server;

fn socket_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("tubesum-{}-{}.sock", name, std::process::id()))
        .to_string_lossy()
        .into_owned()
}

fn make_state(socket: &str) -> RouterState {
    let generator = GeminiSummaryClient::new(GeneratorConfig::default()).expect("client");
    RouterState::new(
        Arc::new(SummaryStore::new(Arc::new(MemoryKvStore::new()))),
        Arc::new(generator),
        TubesumConfig::ephemeral(socket),
    )
}

fn spawn_server(
    path: &str,
    tx: &broadcast::Sender<()>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let server_path = path.to_string();
    let state = make_state(path);
    let shutdown = tx.subscribe();
    tokio::spawn(async move { server::run_unix_server(&server_path, state, shutdown).await })
}

async fn connect(path: &str) -> Framed<UnixStream, LengthDelimitedCodec> {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return Framed::new(stream, LengthDelimitedCodec::builder().little_endian().new_codec());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never came up on {}", path);
}

async fn call(
    conn: &mut Framed<UnixStream, LengthDelimitedCodec>,
    request: &TubesumRequest,
) -> TubesumResponse {
    conn.send(Bytes::from(encode_frame(request).unwrap())).await.unwrap();
    let frame = conn.next().await.expect("response frame").unwrap();
    decode_frame(&frame).unwrap()
}

fn summary(text: &str) -> SummaryResult {
    SummaryResult {
        summary: text.to_string(),
        action_steps: vec![],
        concepts: vec![Concept {
            title: "Point".to_string(),
            timestamp: "0:05".to_string(),
        }],
    }
}

#[tokio::test]
async fn test_ipc_history_flow() {
    let path = socket_path("flow");
    let (tx, _rx) = broadcast::channel(1);
    let server_task = spawn_server(&path, &tx);

    let mut conn = connect(&path).await;

    let pong = call(&mut conn, &TubesumRequest::Ping).await;
    assert_eq!(pong.data.unwrap()["pong"], true);

    for (id, text) in [("v1", "S1"), ("v2", "S2"), ("v1", "S3")] {
        let resp = call(
            &mut conn,
            &TubesumRequest::SaveToHistory {
                video_id: id.to_string(),
                title: format!("Title {}", id),
                data: summary(text),
                timestamp: None,
            },
        )
        .await;
        assert!(resp.is_ok(), "saveToHistory failed: {:?}", resp.error);
    }

    let history = call(&mut conn, &TubesumRequest::GetHistory).await.data.unwrap();
    let ids: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["videoId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["v1", "v2"]);
    assert_eq!(history[0]["summary"]["summary"], "S3");

    let cached = call(
        &mut conn,
        &TubesumRequest::GetCachedSummary {
            video_id: "v1".to_string(),
        },
    )
    .await;
    assert_eq!(cached.data.unwrap()["summaryData"]["summary"], "S3");

    call(&mut conn, &TubesumRequest::RecordUsage { duration_seconds: Some(600) }).await;
    call(&mut conn, &TubesumRequest::RecordUsage { duration_seconds: Some(1200) }).await;
    let usage = call(&mut conn, &TubesumRequest::GetTimeSaved).await.data.unwrap();
    assert_eq!(usage["timeSaved"], 1800);
    assert_eq!(usage["videosSummarized"], 2);

    let cleared = call(&mut conn, &TubesumRequest::ClearHistory).await;
    assert_eq!(cleared.data.unwrap()["success"], true);
    let cached = call(
        &mut conn,
        &TubesumRequest::GetCachedSummary {
            video_id: "v2".to_string(),
        },
    )
    .await;
    // A null payload travels as MessagePack nil
    assert!(cached.data.unwrap_or_default().is_null());

    tx.send(()).unwrap();
    server_task.await.unwrap().unwrap();
    assert!(!std::path::Path::new(&path).exists(), "socket file should be removed");
}

#[tokio::test]
async fn test_ipc_bad_frame_gets_error_and_connection_survives() {
    let path = socket_path("badframe");
    let (tx, _rx) = broadcast::channel(1);
    let server_task = spawn_server(&path, &tx);

    let mut conn = connect(&path).await;

    conn.send(Bytes::from_static(b"\xc1 not msgpack")).await.unwrap();
    let frame = conn.next().await.unwrap().unwrap();
    let resp: TubesumResponse = decode_frame(&frame).unwrap();
    assert_eq!(resp.status, "error");
    assert_eq!(resp.error_kind, Some(ErrorKind::Request));

    let pong = call(&mut conn, &TubesumRequest::Ping).await;
    assert!(pong.is_ok());

    tx.send(()).unwrap();
    server_task.await.unwrap().unwrap();
}
