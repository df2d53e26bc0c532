//! Worker→core check-in channel: the other half of the worker boot sequence,
//! once it has finished its own sandbox setup, dialing back into
//! the core over a WebSocket opened at an internal URL carrying its `pid`
//! (`<childUri>pid=<pid>...`). This is the other half of `ForkerHandle`'s
//! stubbed-out process boundary: the forker only *asks* for a worker, this
//! endpoint is where the resulting process actually announces itself and
//! joins [`coedit_worker::WorkerPool`]'s idle set.
//!
//! The connection is held open for the worker's lifetime; its closing is
//! the pool's only signal that the worker died, so `top_up()` runs there
//! rather than via `WorkerPool::worker_died`, which expects the session the
//! dead worker was serving rather than the worker itself.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use coedit_worker::WorkerHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic id for worker handles registered through this process; the
/// real forker would hand out an id scoped to the sandbox it set up, but
/// nothing downstream inspects it beyond using it as a LIFO pool key.
static NEXT_WORKER_ID: AtomicU32 = AtomicU32::new(1);

pub async fn handle_worker_checkin(
	ws: WebSocketUpgrade,
	Query(params): Query<HashMap<String, String>>,
	State(state): State<AppState>,
) -> impl IntoResponse {
	let pid: u32 = params.get("pid").and_then(|v| v.parse().ok()).unwrap_or(0);
	ws.on_upgrade(move |socket| run_worker_session(socket, state, pid))
}

async fn run_worker_session(mut socket: WebSocket, state: AppState, pid: u32) {
	let id = NEXT_WORKER_ID.fetch_add(1, Ordering::SeqCst);
	let handle = WorkerHandle::new(id, pid);
	log::info!("worker checked in: id={id} pid={pid}");
	state.server.worker_pool().worker_ready(handle);

	while let Some(frame) = socket.recv().await {
		match frame {
			Ok(Message::Close(_)) | Err(_) => break,
			Ok(_) => {}
		}
	}

	log::warn!("worker id={id} pid={pid} disconnected; requesting a replacement");
	if let Err(err) = state.server.worker_pool().top_up() {
		log::error!("failed to top up worker pool after worker id={id} disconnected: {err:#}");
	}
}
