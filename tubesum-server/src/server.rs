use crate::router::{self, RouterState};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tubesum_core::ipc::{decode_frame, encode_frame, ErrorKind, TubesumRequest, TubesumResponse};

/// Accept IPC clients on `socket_path` until `shutdown` fires. A stale socket
/// file from a previous run is replaced, and the file is removed on exit.
pub async fn run_unix_server(
    socket_path: &str,
    state: RouterState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    remove_socket_file(socket_path)?;

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!(socket = %socket_path, "IPC server listening");

    let mut next_conn_id: u64 = 0;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        tracing::warn!("Failed to accept IPC client: {}", e);
                        continue;
                    }
                };
                next_conn_id += 1;
                let conn_id = next_conn_id;
                let state = state.clone();
                tokio::spawn(async move {
                    tracing::debug!(conn_id, "IPC client connected");
                    let (read, write) = stream.into_split();
                    serve_connection(read, write, &state).await;
                    tracing::debug!(conn_id, "IPC client disconnected");
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("IPC server shutting down");
                break;
            }
        }
    }

    remove_socket_file(socket_path)?;
    Ok(())
}

fn remove_socket_file(socket_path: &str) -> std::io::Result<()> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }
    Ok(())
}

/// Serve one client until it disconnects. Each frame is a 4-byte little-endian
/// length prefix followed by a MessagePack request; every request gets exactly
/// one response frame, in order.
pub async fn serve_connection<R, W>(read: R, write: W, state: &RouterState)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let le_codec = || LengthDelimitedCodec::builder().little_endian().new_codec();
    let mut framed_read = FramedRead::new(read, le_codec());
    let mut framed_write = FramedWrite::new(write, le_codec());

    while let Some(frame) = framed_read.next().await {
        let bytes_mut = match frame {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Frame error: {}", e);
                break;
            }
        };

        let response = match decode_frame::<TubesumRequest>(&bytes_mut) {
            Ok(request) => router::handle_request(request, state).await,
            Err(e) => TubesumResponse::err(ErrorKind::Request, format!("Deserialization error: {}", e)),
        };

        match encode_frame(&response) {
            Ok(resp_bytes) => {
                if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
                    tracing::error!("Failed to send response: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                break;
            }
        }
    }
}
