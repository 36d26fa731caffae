use crate::reconnect::{Reconnect, WaitOutcome};
use crate::registry::Registry;
use crate::request;
use crate::response::Payload;
use crate::room::Room;

use futures_util::{stream, SinkExt, StreamExt, TryFutureExt};
use log::{debug, error, info};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::sse::Event;
use warp::ws::{Message, WebSocket};
use warp::Reply;

const RECONNECT_KEY_INTERVAL: u64 = 60;

#[derive(Clone)]
pub(crate) struct Ctx {
    pub registry: Arc<Registry>,
    pub reconnect: Arc<Reconnect>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct HostQuery {
    #[serde(rename = "reconnectKey")]
    pub reconnect_key: Option<String>,
}

pub(crate) async fn host_connected(ws: WebSocket, query: HostQuery, ctx: Ctx) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut rx = UnboundedReceiverStream::new(rx);

    tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            ws_tx
                .send(message)
                .unwrap_or_else(|e| error!("websocket send error: {}", e))
                .await;
        }
    });

    let (code, room) = match ctx.reconnect.attempt(query.reconnect_key.as_deref()) {
        Ok((code, room)) => {
            info!("Host reconnected to room {}", code);
            (code, room)
        }
        Err(err) => {
            debug!("{}", err);
            let (code, room) = ctx.registry.create();
            info!("Created room {}", code);
            (code, room)
        }
    };

    let _ = tx.send(Message::text(Payload::Code { code: code.clone() }.to_json()));

    // The first tick fires immediately: the host holds a valid reconnection
    // key from the moment its room code is announced.
    let mut key_ticker = interval(Duration::from_secs(RECONNECT_KEY_INTERVAL));

    loop {
        tokio::select! {
            _ = key_ticker.tick() => match ctx.reconnect.issue(&code) {
                Ok(key) => {
                    let _ = tx.send(Message::text(Payload::ReconnectKey { key }.to_json()));
                }
                Err(err) => error!("Could not issue reconnection key: {}", err),
            },
            incoming = ws_rx.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) if !msg.is_close() => msg,
                    _ => {
                        info!("Host disconnected from room {}", code);
                        let pending = room.host_disconnected();
                        room.broadcast(&Payload::HostDisconnected.to_json());
                        if let WaitOutcome::Reconnected = ctx.reconnect.wait(&code, &room, pending).await {
                            info!("Host resumed room {}", code);
                        }
                        break;
                    }
                };
                if !msg.is_text() {
                    continue;
                }
                let text = msg.to_str().unwrap();
                let payload = match serde_json::from_str::<request::Payload>(text) {
                    Ok(payload) => payload,
                    Err(err) => {
                        debug!("{}", err);
                        continue;
                    }
                };
                if let request::Payload::RemoveRoom = payload {
                    ctx.registry.remove(&code);
                    room.close();
                    info!("Removed room {}", code);
                    break;
                }
                apply(&room, &payload);
                room.broadcast(text);
            }
        }
    }
}

fn apply(room: &Room, payload: &request::Payload) {
    match payload {
        request::Payload::Sync {
            path,
            time,
            rate,
            is_paused,
        } => room.update_video_state(|v| {
            v.update_path(path);
            v.update_is_paused(*is_paused);
            v.update_rate(*rate);
            v.update_time(*time);
        }),
        request::Payload::StartPlaying { time } => room.update_video_state(|v| {
            v.update_is_paused(false);
            v.update_time(*time);
        }),
        request::Payload::Pause { time } => room.update_video_state(|v| {
            v.update_is_paused(true);
            v.update_time(*time);
        }),
        request::Payload::PathChange { path } => room.update_video_state(|v| v.update_path(path)),
        request::Payload::RateChange { rate } => room.update_video_state(|v| v.update_rate(*rate)),
        request::Payload::RemoveRoom => {}
    }
}

struct Leave {
    room: Arc<Room>,
    id: Uuid,
    code: String,
}

impl Drop for Leave {
    fn drop(&mut self) {
        self.room.leave(&self.id);
        info!("Viewer {} left room {}", self.id, self.code);
    }
}

pub(crate) fn room_events(code: String, ctx: Ctx) -> warp::reply::Response {
    let room = match ctx.registry.get(&code) {
        Some(room) => room,
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let (id, snapshot, host_connected) = match room.join(tx) {
        Some(joined) => joined,
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    info!("Viewer {} joined room {}", id, code);

    let mut initial = vec![Payload::from(&snapshot).to_json()];
    if !host_connected {
        initial.push(Payload::HostDisconnected.to_json());
    }

    // The guard lives inside the stream: whichever way the stream ends, the
    // subscriber is deregistered.
    let guard = Leave { room, id, code };
    let events = stream::iter(initial)
        .chain(UnboundedReceiverStream::new(rx))
        .chain(stream::once(async { Payload::Close.to_json() }))
        .map(move |msg| {
            let _ = &guard;
            Ok::<_, Infallible>(Event::default().data(msg))
        });

    warp::sse::reply(warp::sse::keep_alive().stream(events)).into_response()
}

pub(crate) fn room_path(code: String, ctx: Ctx) -> warp::reply::Response {
    match ctx.registry.get(&code) {
        Some(room) => room.current_path().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
