//! The admin channel: a separate WebSocket endpoint for authenticated
//! operators. Accepts line commands and either answers once or starts a
//! live push depending on the command.
//!
//! Topic filtering for `subscribe`/`unsubscribe` is applied here, at the
//! connection layer, rather than inside `AdminModel`: the model only knows
//! how to broadcast to everyone and let a connection prune itself, so each
//! admin socket keeps its own topic set and drops any broadcast message
//! whose leading token isn't in it.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::http::{HeaderMap, StatusCode, header};
use std::collections::HashSet;

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
	let (Some(expected_user), Some(expected_pass)) =
		(state.config.admin.username.as_deref(), state.config.admin.password.as_deref())
	else {
		return true;
	};
	let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
		return false;
	};
	let Some(encoded) = auth.strip_prefix("Basic ") else {
		return false;
	};
	let Ok(decoded) = base64_decode(encoded) else {
		return false;
	};
	decoded == format!("{expected_user}:{expected_pass}")
}

/// Minimal base64 decoder so the admin channel's Basic-auth check doesn't
/// pull in a whole crate for one header. Rejects padding-less or malformed
/// input rather than guessing.
fn base64_decode(input: &str) -> Result<String, ()> {
	const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
	let input = input.trim_end_matches('=');
	let mut bits: u32 = 0;
	let mut bit_count = 0;
	let mut out = Vec::new();
	for ch in input.bytes() {
		let value = ALPHABET.iter().position(|&c| c == ch).ok_or(())? as u32;
		bits = (bits << 6) | value;
		bit_count += 6;
		if bit_count >= 8 {
			bit_count -= 8;
			out.push((bits >> bit_count) as u8);
		}
	}
	String::from_utf8(out).map_err(|_| ())
}

pub async fn handle_admin_socket(
	ws: WebSocketUpgrade,
	headers: HeaderMap,
	State(state): State<AppState>,
) -> impl IntoResponse {
	if !authorized(&state, &headers) {
		return (StatusCode::UNAUTHORIZED, "admin authentication required").into_response();
	}
	ws.on_upgrade(move |socket| run_admin_session(socket, state)).into_response()
}

async fn run_admin_session(mut socket: WebSocket, state: AppState) {
	let session_id = state.server.next_session_id();
	let mut topics: HashSet<String> = HashSet::new();
	let mut push = None;

	loop {
		tokio::select! {
			frame = socket.recv() => {
				let Some(Ok(Message::Text(text))) = frame else { break };
				match handle_command(&state, session_id, &text, &mut topics) {
					Some(AdminOutcome::Reply(reply)) => {
						if socket.send(Message::Text(reply.into())).await.is_err() { break; }
					}
					Some(AdminOutcome::Subscribed(rx)) => push = Some(rx),
					None => {}
				}
			}
			Some(message) = async {
				match push.as_mut() {
					Some(rx) => rx.recv().await,
					None => std::future::pending().await,
				}
			} => {
				let first_token = message.split_whitespace().next().unwrap_or_default();
				if topics.contains(first_token) && socket.send(Message::Text(message.into())).await.is_err() {
					break;
				}
			}
		}
	}

	state.server.admin().unsubscribe(session_id);
}

enum AdminOutcome {
	Reply(String),
	Subscribed(tokio::sync::mpsc::UnboundedReceiver<String>),
}

fn handle_command(state: &AppState, session_id: coedit_core::SessionId, line: &str, topics: &mut HashSet<String>) -> Option<AdminOutcome> {
	let mut tokens = line.split_whitespace();
	let command = tokens.next()?;
	match command {
		"documents" => Some(AdminOutcome::Reply(documents_listing(state))),
		"active_users_count" => Some(AdminOutcome::Reply(state.server.active_users_count().to_string())),
		"active_docs_count" => Some(AdminOutcome::Reply(state.server.active_docs_count().to_string())),
		"mem_stats" => Some(AdminOutcome::Reply(state.server.admin().mem_stats())),
		"cpu_stats" => Some(AdminOutcome::Reply(state.server.admin().cpu_stats())),
		"subscribe" => {
			if let Some(topic) = tokens.next() {
				topics.insert(topic.to_string());
			}
			let rx = state.server.admin().subscribe(session_id);
			Some(AdminOutcome::Subscribed(rx))
		}
		"unsubscribe" => {
			if let Some(topic) = tokens.next() {
				topics.remove(topic);
			}
			if topics.is_empty() {
				state.server.admin().unsubscribe(session_id);
			}
			None
		}
		_ => Some(AdminOutcome::Reply(format!("error: cmd={command} kind=unknown"))),
	}
}

fn documents_listing(state: &AppState) -> String {
	let mut lines = Vec::new();
	state.server.for_each_broker(|broker| {
		let pid = broker.worker().map_or(0, |w| w.pid());
		lines.push(format!(
			"{} {} {} {} {}",
			pid,
			broker.public_url(),
			broker.session_count(),
			state.server.admin().current_mem_bytes() / 1024,
			broker.elapsed_seconds(),
		));
	});
	lines.join("\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn base64_decode_round_trips_basic_credentials() {
		assert_eq!(base64_decode("YWRtaW46c2VjcmV0").unwrap(), "admin:secret");
	}

	#[test]
	fn base64_decode_rejects_invalid_characters() {
		assert!(base64_decode("not base64!!").is_err());
	}
}
