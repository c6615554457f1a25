//! Line-oriented JSON bridge for the presentation layer.
//!
//! Each request is one JSON object per line, answered by one JSON object per
//! line:
//!
//! ```text
//! -> {"command": "reboot", "data": {"id": "C"}}
//! <- {}
//! -> {"command": "route", "data": {"id": "C", "route": "@ <-> C"}}
//! <- {"alert": "Node in route is not ready"}
//! -> {"command": "updates"}
//! <- {"page": true, "node_C": {"last_updated": "..."}}
//! -> {"command": "devices"}
//! <- [{"id": "B", "name": "Garage", "address": "@ <-> B", ...}]
//! -> {"command": "file", "data": {"name": "B_current_image_0_1717236001.000000.jpg"}}
//! <- {"name": "B_current_image_0_1717236001.000000.jpg", "hex": "ffd8..."}
//! ```

use odonet_core::transport::{Transport, TransportListener};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::{error::ServerError, root::RootHandle};

#[derive(Debug, Deserialize)]
struct Request {
    command: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct FileRequest {
    name: String,
}

/// Cached image bytes, hex encoded so they fit in one JSON line.
fn file_reply(handle: &RootHandle, data: Value) -> Value {
    let request: FileRequest = match serde_json::from_value(data) {
        Ok(request) => request,
        Err(err) => return json!({ "alert": format!("Invalid request: {err}") }),
    };

    match handle.file(&request.name) {
        Some(bytes) => json!({ "name": request.name, "hex": hex::encode(&bytes) }),
        None => json!({ "alert": "Unknown file" }),
    }
}

/// Answer one request line.
#[must_use]
pub fn respond(handle: &RootHandle, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => return json!({ "alert": format!("Invalid request: {err}") }),
    };

    match request.command.as_str() {
        "updates" => handle.drain_updates().to_json(),
        "devices" => Value::Array(
            handle
                .devices()
                .iter()
                .map(|record| {
                    json!({
                        "id": record.id.to_string(),
                        "name": record.name,
                        "address": record.address_display(),
                        "ready": record.is_ready(),
                        "wifi_quality": record.wifi_quality,
                        "last_updated": record.last_updated.map(|t| t.to_rfc3339()),
                        "current_images": record.current_images.values().collect::<Vec<_>>(),
                    })
                })
                .collect(),
        ),
        "file" => file_reply(handle, request.data),
        name => handle.handle_command(name, request.data).to_json(),
    }
}

/// Serve the bridge on `endpoint` until the listener fails.
///
/// # Errors
///
/// Only if the listener cannot be bound.
pub async fn serve<T: Transport>(transport: &T, endpoint: &str, handle: RootHandle) -> Result<(), ServerError> {
    let listener = transport
        .bind(endpoint)
        .await
        .map_err(|source| ServerError::Bind { endpoint: endpoint.to_string(), source })?;
    info!(endpoint, "Bridge listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "Bridge accept failed");
                continue;
            },
        };

        let handle = handle.clone();
        tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(stream);
            let mut lines = BufReader::new(reader).lines();

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        debug!(peer, error = %err, "Bridge client read failed");
                        break;
                    },
                };
                if line.trim().is_empty() {
                    continue;
                }

                let mut reply = respond(&handle, &line).to_string();
                reply.push('\n');
                if let Err(err) = writer.write_all(reply.as_bytes()).await {
                    debug!(peer, error = %err, "Bridge client write failed");
                    break;
                }
            }
        });
    }
}
