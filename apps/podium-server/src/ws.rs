//! Manual socket upgrade onto the hub fan-out.
//!
//! The handshake is performed by hand: validate the upgrade headers, derive
//! the accept key, return 101, then drive the upgraded byte stream with the
//! frame codec. Outbound events are single text frames; inbound frames are
//! only read for close detection.

use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderValue, Response, StatusCode};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use podium_bus::{accept_key, decode_frame, encode_close_frame, encode_text_frame, EventFilter, Frame};
use podium_runtime::AgentRuntime;

use crate::AppState;

pub(crate) async fn live_ws(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
    mut req: Request,
) -> Response<Body> {
    let upgrade_requested = req
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    let client_key = req
        .headers()
        .get("sec-websocket-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let (Some(client_key), true) = (client_key, upgrade_requested) else {
        return bad_handshake("missing upgrade headers");
    };
    let Some(on_upgrade) = req.extensions_mut().remove::<OnUpgrade>() else {
        return bad_handshake("connection is not upgradable");
    };

    let accept = accept_key(&client_key);
    let runtime = state.runtime.clone();
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                if let Err(err) = drive_socket(TokioIo::new(upgraded), runtime, filter).await {
                    tracing::debug!(error = %err, "websocket connection ended with error");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "websocket upgrade failed");
            }
        }
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    if let Ok(value) = HeaderValue::from_str(&accept) {
        headers.insert("sec-websocket-accept", value);
    }
    response
}

fn bad_handshake(message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}

/// Pump hub events out as text frames until the peer closes or a write
/// fails. The subscriber is removed on every exit path.
async fn drive_socket<S>(
    mut socket: S,
    runtime: AgentRuntime,
    filter: EventFilter,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut sub = runtime.hub.subscribe(filter).await;
    let mut read_buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    let result = loop {
        tokio::select! {
            event = sub.rx.recv() => {
                match event {
                    Some(event) => {
                        let text = serde_json::to_string(&event)
                            .unwrap_or_else(|_| "{}".to_string());
                        if let Err(err) = socket.write_all(&encode_text_frame(&text)).await {
                            break Err(err);
                        }
                    }
                    None => break Ok(()),
                }
            }
            read = socket.read(&mut chunk) => {
                let n = match read {
                    Ok(0) => break Ok(()),
                    Ok(n) => n,
                    Err(err) => break Err(err),
                };
                read_buf.extend_from_slice(&chunk[..n]);
                match drain_frames(&mut read_buf) {
                    Ok(true) => {
                        let _ = socket.write_all(&encode_close_frame()).await;
                        break Ok(());
                    }
                    Ok(false) => {}
                    Err(message) => {
                        tracing::debug!(error = %message, "dropping socket on bad frame");
                        break Ok(());
                    }
                }
            }
        }
    };

    runtime.hub.unsubscribe(&sub.id).await;
    result
}

/// Decode every complete frame in the buffer; returns true when a close
/// frame was seen. Inbound text frames carry no protocol meaning here and
/// are discarded.
fn drain_frames(buf: &mut Vec<u8>) -> Result<bool, String> {
    loop {
        match decode_frame(buf) {
            Ok(Some((frame, consumed))) => {
                buf.drain(..consumed);
                if matches!(frame, Frame::Close) {
                    return Ok(true);
                }
            }
            Ok(None) => return Ok(false),
            Err(err) => return Err(err.to_string()),
        }
    }
}
