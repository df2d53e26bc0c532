//! WebSocket dispatch: upgrades a browser connection, finds-or-creates the
//! document's broker, binds a client/worker session pair, and pumps frames
//! between the client socket and the broker, applying the tile-request
//! short-circuit and edit-lock gating along the way.
//!
//! The real out-of-scope worker process is modeled only through
//! [`coedit_worker::WorkerLink`]; nothing here waits for or parses a reply
//! from it; the worker-facing half of the session exists so the edit-lock
//! gate and message-queue policies apply to it exactly as they would to a
//! real control channel.

use crate::state::AppState;
use crate::storage;
use crate::wire::{self, ParsedCommand};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use coedit_broker::BrokerSnoop;
use coedit_core::{DocKey, SessionId, TileId};
use coedit_session::{Session, SessionKind, SessionPair};
use coedit_worker::LoggingWorkerLink;
use futures_util::{SinkExt, StreamExt};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WORKER_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Same whitespace-must-not-survive rule the wire grammar applies to every
/// `key=value` token: re-encode a previously-decoded value before it is
/// written back onto a space-delimited line.
const VALUE_UNSAFE: &AsciiSet = &CONTROLS.add(b' ').add(b'=').add(b'&');

/// Commands that bypass edit-lock gating entirely: the retrieved
/// `ChildSession.cpp`/`ClientSession.cpp` slice dispatches these at a level
/// before the edit-lock check ever runs (a viewer without the lock must
/// still be able to request and cancel its own tiles).
fn bypasses_edit_lock(command: &str) -> bool {
	matches!(command, "tile" | "tilecombine" | "canceltiles")
}

pub async fn handle_document_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
	ws.on_upgrade(move |socket| run_document_session(socket, state))
}

async fn run_document_session(socket: WebSocket, state: AppState) {
	let session_id = state.server.next_session_id();
	let (mut write, mut read) = socket.split();
	let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

	let writer = tokio::spawn(async move {
		while let Some(message) = outbound_rx.recv().await {
			if write.send(message).await.is_err() {
				break;
			}
		}
	});

	if let Err(err) = negotiate_and_pump(&mut read, &outbound_tx, &state, session_id).await {
		log::info!("session {session_id} ended: {err:#}");
	}

	drop(outbound_tx);
	writer.await.ok();
}

async fn send_text(tx: &mpsc::UnboundedSender<Message>, text: impl Into<String>) {
	tx.send(Message::Text(text.into().into())).ok();
}

async fn negotiate_and_pump(
	read: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
	outbound_tx: &mpsc::UnboundedSender<Message>,
	state: &AppState,
	session_id: SessionId,
) -> anyhow::Result<()> {
	let Some(Ok(Message::Text(first))) = read.next().await else {
		anyhow::bail!("socket closed before loolclient handshake");
	};
	let handshake = wire::parse_command(&first);
	if handshake.command != "loolclient" {
		send_text(outbound_tx, "error: cmd=loolclient kind=badversion").await;
		anyhow::bail!("expected loolclient handshake, got '{}'", handshake.command);
	}
	send_text(outbound_tx, "loolserver 0.1").await;

	let Some(Ok(Message::Text(load_line))) = read.next().await else {
		anyhow::bail!("socket closed before load command");
	};
	let load = wire::parse_command(&load_line);
	if load.command != "load" {
		send_text(outbound_tx, "error: cmd=load kind=syntax").await;
		anyhow::bail!("expected load command, got '{}'", load.command);
	}
	let Some(url) = load.get("url") else {
		send_text(outbound_tx, "error: cmd=load kind=uriinvalid").await;
		anyhow::bail!("load command missing url=");
	};

	send_text(outbound_tx, "statusindicator: find").await;

	let (host, path) = wire::split_uri(url);
	let key = DocKey::from_uri(host, path);

	let url_owned = url.to_string();
	let filesystem_allowed = state.filesystem_allowed();
	let cache_root = state.tile_cache_root();
	let server = state.server.clone();
	let broker = server.get_or_create_broker(key.clone(), || {
		let storage = storage::build_storage(&url_owned, filesystem_allowed)
			.unwrap_or_else(|err| panic!("building storage backend for '{url_owned}' failed: {err:#}"));
		Arc::new(coedit_broker::DocumentBroker::new(key.clone(), url_owned.clone(), storage, &cache_root))
	});

	send_text(outbound_tx, "statusindicator: connect").await;

	if broker.worker().is_none() {
		match server.worker_pool().acquire(WORKER_ACQUIRE_TIMEOUT).await {
			Ok(handle) => broker.assign_worker(handle),
			Err(err) => {
				log::warn!("worker acquisition failed for '{key}': {err:#}");
				send_text(outbound_tx, "statusindicator: fail").await;
				// WebSocket close code 1001: "going away" (/S5).
				outbound_tx
					.send(Message::Close(Some(CloseFrame {
						code: 1001,
						reason: "no worker process available".into(),
					})))
					.ok();
				server.remove_broker_if_empty(&key);
				anyhow::bail!("no idle worker available for '{key}'");
			}
		}
	}

	let filename = std::path::Path::new(url)
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_else(|| "document".to_string());
	let jail_root = state.jail_root();
	let jailed_path = coedit_core::jailed_document_path(&jail_root, &session_id.to_string(), &filename);
	broker.load(&jailed_path).await?;
	broker.add_session(session_id);
	if broker.edit_lock().holder().is_none() {
		broker.edit_lock().transfer_to(session_id);
	}

	let client_session = Arc::new(Session::new(session_id, SessionKind::Client));
	let worker_session = Arc::new(Session::new(server.next_session_id(), SessionKind::Worker));
	let effects = Arc::new(BrokerSnoop::new(broker.clone(), client_session.clone()));
	let pair = SessionPair::new(client_session.clone(), worker_session.clone(), broker.edit_lock().clone(), effects);

	let worker_link: Arc<dyn coedit_worker::WorkerLink> = Arc::new(LoggingWorkerLink::new());
	worker_session.send(format!(
		"load url={} jail={} author={}",
		utf8_percent_encode(url, VALUE_UNSAFE),
		utf8_percent_encode(&jailed_path.display().to_string(), VALUE_UNSAFE),
		utf8_percent_encode(load.get("author").unwrap_or("anonymous"), VALUE_UNSAFE),
	));
	drain_worker_queue(&worker_session, &worker_link, &key);

	let locked = broker.edit_lock().holder() == Some(session_id);
	send_text(outbound_tx, format!("editlock: {}", u8::from(locked))).await;
	send_text(outbound_tx, "statusindicator: ready").await;

	let client_queue_pump = {
		let client_session = client_session.clone();
		let outbound_tx = outbound_tx.clone();
		tokio::spawn(async move {
			loop {
				let message = client_session.recv().await;
				if outbound_tx.send(Message::Text(message.into())).is_err() {
					break;
				}
			}
		})
	};

	let result = read_loop(read, outbound_tx, &broker, &pair, &worker_session, &worker_link).await;

	client_queue_pump.abort();
	broker.remove_session(session_id);
	state.server.remove_broker_if_empty(&key);
	result
}

fn drain_worker_queue(worker_session: &Arc<Session>, worker_link: &Arc<dyn coedit_worker::WorkerLink>, key: &DocKey) {
	// The worker is a stub: everything queued for it is logged, never
	// actually rendered. Drain synchronously here (rather than spawning a
	// pump task) since nothing will ever reply.
	while let Some(message) = worker_session.try_recv() {
		if let Err(err) = worker_link.dispatch(worker_session.id(), key.as_str(), &message) {
			log::warn!("worker link dispatch failed for '{key}': {err:#}");
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn read_loop(
	read: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
	outbound_tx: &mpsc::UnboundedSender<Message>,
	broker: &Arc<coedit_broker::DocumentBroker>,
	pair: &SessionPair,
	worker_session: &Arc<Session>,
	worker_link: &Arc<dyn coedit_worker::WorkerLink>,
) -> anyhow::Result<()> {
	while let Some(frame) = read.next().await {
		let Ok(message) = frame else { break };
		let Message::Text(text) = message else { continue };
		let parsed = wire::parse_command(&text);

		if bypasses_edit_lock(&parsed.command) {
			handle_tile_family(&parsed, &text, outbound_tx, broker, worker_session, worker_link).await;
			continue;
		}

		pair.forward_to_worker(text.to_string());
		drain_worker_queue(worker_session, worker_link, broker.key());
	}
	Ok(())
}

async fn handle_tile_family(
	parsed: &ParsedCommand,
	raw: &str,
	outbound_tx: &mpsc::UnboundedSender<Message>,
	broker: &Arc<coedit_broker::DocumentBroker>,
	worker_session: &Arc<Session>,
	worker_link: &Arc<dyn coedit_worker::WorkerLink>,
) {
	match parsed.command.as_str() {
		"canceltiles" => {
			worker_session.send(raw.to_string());
			drain_worker_queue(worker_session, worker_link, broker.key());
		}
		"tile" => {
			if let Some(id) = parse_tile_id(parsed) {
				serve_or_forward_tile(id, outbound_tx, broker, worker_session, worker_link, parsed.get("id")).await;
			} else {
				send_text(outbound_tx, "error: cmd=tile kind=invalid").await;
			}
		}
		"tilecombine" => {
			handle_tilecombine(parsed, outbound_tx, broker, worker_session, worker_link).await;
		}
		_ => {}
	}
}

fn parse_tile_id(parsed: &ParsedCommand) -> Option<TileId> {
	let id = TileId {
		part: parsed.get("part")?.parse().ok()?,
		width: parsed.get("width")?.parse().ok()?,
		height: parsed.get("height")?.parse().ok()?,
		tile_pos_x: parsed.get("tileposx")?.parse().ok()?,
		tile_pos_y: parsed.get("tileposy")?.parse().ok()?,
		tile_width: parsed.get("tilewidth")?.parse().ok()?,
		tile_height: parsed.get("tileheight")?.parse().ok()?,
	};
	if id.width == 0 || id.height == 0 || id.tile_width <= 0 || id.tile_height <= 0 || id.tile_pos_x < 0 || id.tile_pos_y < 0 {
		return None;
	}
	Some(id)
}

async fn serve_or_forward_tile(
	id: TileId,
	outbound_tx: &mpsc::UnboundedSender<Message>,
	broker: &Arc<coedit_broker::DocumentBroker>,
	worker_session: &Arc<Session>,
	worker_link: &Arc<dyn coedit_worker::WorkerLink>,
	explicit_id: Option<&str>,
) {
	match broker.handle_tile_request(id) {
		Ok(Some(blob)) => {
			let header = tile_header(id, explicit_id);
			let mut frame = header.into_bytes();
			frame.extend_from_slice(blob.as_slice());
			outbound_tx.send(Message::Binary(frame.into())).ok();
		}
		Ok(None) => {
			worker_session.send(format!("tile {}", tile_query(id, explicit_id)));
			drain_worker_queue(worker_session, worker_link, broker.key());
		}
		Err(err) => log::warn!("tile cache lookup failed for '{}': {err:#}", broker.key()),
	}
}

async fn handle_tilecombine(
	parsed: &ParsedCommand,
	outbound_tx: &mpsc::UnboundedSender<Message>,
	broker: &Arc<coedit_broker::DocumentBroker>,
	worker_session: &Arc<Session>,
	worker_link: &Arc<dyn coedit_worker::WorkerLink>,
) {
	let (Some(part), Some(width), Some(height), Some(tw), Some(th)) = (
		parsed.get("part").and_then(|v| v.parse::<u32>().ok()),
		parsed.get("width").and_then(|v| v.parse::<u32>().ok()),
		parsed.get("height").and_then(|v| v.parse::<u32>().ok()),
		parsed.get("tilewidth").and_then(|v| v.parse::<i64>().ok()),
		parsed.get("tileheight").and_then(|v| v.parse::<i64>().ok()),
	) else {
		send_text(outbound_tx, "error: cmd=tilecombine kind=invalid").await;
		return;
	};
	let xs: Vec<&str> = parsed.get("tileposx").unwrap_or_default().split(',').filter(|s| !s.is_empty()).collect();
	let ys: Vec<&str> = parsed.get("tileposy").unwrap_or_default().split(',').filter(|s| !s.is_empty()).collect();
	if xs.len() != ys.len() || xs.is_empty() {
		send_text(outbound_tx, "error: cmd=tilecombine kind=invalid").await;
		return;
	}
	for (x, y) in xs.iter().zip(ys.iter()) {
		let (Ok(tile_pos_x), Ok(tile_pos_y)) = (x.parse::<i64>(), y.parse::<i64>()) else {
			send_text(outbound_tx, "error: cmd=tilecombine kind=invalid").await;
			continue;
		};
		let id = TileId { part, width, height, tile_pos_x, tile_pos_y, tile_width: tw, tile_height: th };
		serve_or_forward_tile(id, outbound_tx, broker, worker_session, worker_link, parsed.get("id")).await;
	}
}

fn tile_query(id: TileId, explicit_id: Option<&str>) -> String {
	let suffix = explicit_id.map(|v| format!(" id={v}")).unwrap_or_default();
	format!(
		"part={} width={} height={} tileposx={} tileposy={} tilewidth={} tileheight={}{suffix}",
		id.part, id.width, id.height, id.tile_pos_x, id.tile_pos_y, id.tile_width, id.tile_height
	)
}

fn tile_header(id: TileId, explicit_id: Option<&str>) -> String {
	format!("tile: {}\n", tile_query(id, explicit_id))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn command(line: &str) -> ParsedCommand {
		wire::parse_command(line)
	}

	#[test]
	fn parse_tile_id_accepts_well_formed_request() {
		let parsed = command("tile part=0 width=256 height=256 tileposx=0 tileposy=0 tilewidth=3840 tileheight=3840");
		assert!(parse_tile_id(&parsed).is_some());
	}

	#[test]
	fn parse_tile_id_rejects_non_positive_dimensions() {
		let parsed = command("tile part=0 width=0 height=256 tileposx=0 tileposy=0 tilewidth=3840 tileheight=3840");
		assert!(parse_tile_id(&parsed).is_none());
	}

	#[test]
	fn parse_tile_id_rejects_negative_position() {
		let parsed = command("tile part=0 width=256 height=256 tileposx=-1 tileposy=0 tilewidth=3840 tileheight=3840");
		assert!(parse_tile_id(&parsed).is_none());
	}

	#[test]
	fn bypasses_edit_lock_matches_only_tile_family() {
		assert!(bypasses_edit_lock("tile"));
		assert!(bypasses_edit_lock("tilecombine"));
		assert!(bypasses_edit_lock("canceltiles"));
		assert!(!bypasses_edit_lock("key"));
		assert!(!bypasses_edit_lock("uno"));
	}

	#[test]
	fn tile_header_includes_explicit_id_when_present() {
		let id = TileId { part: 0, width: 256, height: 256, tile_pos_x: 0, tile_pos_y: 0, tile_width: 3840, tile_height: 3840 };
		assert!(tile_header(id, Some("42")).contains("id=42"));
		assert!(!tile_header(id, None).contains("id="));
	}
}
