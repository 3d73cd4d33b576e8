//! Push-channel listener. The server announces "data updated" with a
//! human-readable message and no payload; the listener forwards the
//! notification and reconnects with a fixed delay when the stream
//! drops.

use anyhow::Result;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::logging::{self, obj, v_num, v_str, Domain, Level};

pub const DATA_UPDATED: &str = "data_updated";

#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct WsPush {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Parse one frame off the push channel. Only `data_updated` events are
/// meaningful; everything else is ignored.
pub fn parse_push(text: &str) -> Option<LiveEvent> {
    let push: WsPush = serde_json::from_str(text).ok()?;
    if push.event.as_deref() == Some(DATA_UPDATED) {
        Some(LiveEvent {
            message: push.message.unwrap_or_default(),
        })
    } else {
        None
    }
}

/// Connect, forward `data_updated` events, reconnect forever.
pub async fn run_listener(
    ws_url: String,
    reconnect_secs: u64,
    sender: mpsc::Sender<LiveEvent>,
) -> Result<()> {
    loop {
        match tokio_tungstenite::connect_async(&ws_url).await {
            Ok((ws, _)) => {
                logging::log(
                    Level::Info,
                    Domain::Live,
                    "connected",
                    obj(&[("url", v_str(&ws_url))]),
                );
                let (_write, mut read) = ws.split();
                while let Some(msg) = read.next().await {
                    let msg = match msg {
                        Ok(m) => m,
                        Err(_) => break,
                    };
                    if let Ok(text) = msg.into_text() {
                        if let Some(event) = parse_push(&text) {
                            if sender.send(event).await.is_err() {
                                // Receiver is gone: the engine shut down.
                                return Ok(());
                            }
                        }
                    }
                }
                logging::log(
                    Level::Warn,
                    Domain::Live,
                    "disconnected",
                    obj(&[("reconnect_secs", v_num(reconnect_secs as f64))]),
                );
            }
            Err(e) => {
                logging::log(
                    Level::Warn,
                    Domain::Live,
                    "connect_failed",
                    obj(&[("error", v_str(&e.to_string()))]),
                );
            }
        }
        sleep(Duration::from_secs(reconnect_secs)).await;
    }
}
