//! Non-WebSocket HTTP surface: discovery XML, the synchronous `/convert-to`
//! conversion endpoint, and the file-transport routes embedded-image
//! insertion and download-as flows depend on.
//!
//! `/convert-to` drives the same seams the WebSocket dispatcher does
//! (`coedit_worker::WorkerLink`, the save-as rendezvous) rather than a
//! separate code path: it builds a temporary
//! [`coedit_broker::DocumentBroker`], asks the (out-of-scope, stub) worker to
//! render a `saveas`, and waits on the same rendezvous queue an interactive
//! `saveas` command blocks on. Since there is no real sandboxed editor
//! process behind the stub link, this bounded wait will typically time out
//! in this workspace; the endpoint is fully wired so a production
//! deployment need only swap `LoggingWorkerLink`/`NamedPipeForker` for real
//! transports.

use crate::state::AppState;
use crate::storage;
use axum::body::Bytes;
use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use coedit_core::DocKey;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Bounded wait for a conversion's `saveas:` reply, matching the bounded
/// command-timeout every other blocking wait in this server uses.
const CONVERT_TIMEOUT: Duration = Duration::from_secs(30);

/// `GET /hosting/discovery`: a minimal WOPI-style discovery document
/// advertising the document action URL. The Dispatcher's URL parsing only
/// needs this route's existence accounted for, not a full discovery XML
/// generator, so the action list here is the single action
/// this core actually serves.
pub async fn hosting_discovery(State(state): State<AppState>) -> impl IntoResponse {
	let action_url = format!("{}/browser/dist/cool.html?", state.config.bind_addr());
	let xml = format!(
		r#"<?xml version="1.0" encoding="utf-8"?>
<wopi-discovery>
  <net-zone name="external-http">
    <app name="writer" favIconUrl="/browser/dist/images/favicon.ico">
      <action name="edit" ext="odt" urlsrc="http://{action_url}"/>
      <action name="view" ext="odt" urlsrc="http://{action_url}"/>
    </app>
  </net-zone>
</wopi-discovery>
"#
	);
	([(header::CONTENT_TYPE, "text/xml")], xml)
}

/// `POST /convert-to`: multipart `file` + `format` fields. Loads the
/// uploaded file into a throwaway broker, asks the worker to save it as
/// `format`, and streams back whatever bytes land in the jail.
pub async fn convert_to(State(state): State<AppState>, mut multipart: Multipart) -> Response {
	let mut file_bytes: Option<Bytes> = None;
	let mut file_name = "document".to_string();
	let mut format = String::new();

	loop {
		let field = match multipart.next_field().await {
			Ok(Some(field)) => field,
			Ok(None) => break,
			Err(err) => return bad_request(format!("malformed multipart body: {err}")),
		};
		match field.name().unwrap_or_default() {
			"format" => {
				format = match field.text().await {
					Ok(text) => text,
					Err(err) => return bad_request(format!("reading 'format' field: {err}")),
				};
			}
			"file" => {
				if let Some(name) = field.file_name() {
					file_name = name.to_string();
				}
				file_bytes = match field.bytes().await {
					Ok(bytes) => Some(bytes),
					Err(err) => return bad_request(format!("reading 'file' field: {err}")),
				};
			}
			_ => {}
		}
	}

	let Some(bytes) = file_bytes else {
		return bad_request("missing 'file' part".to_string());
	};
	if format.is_empty() {
		return bad_request("missing 'format' field".to_string());
	}

	match run_conversion(&state, &file_name, &bytes, &format).await {
		Ok(converted) => {
			([(header::CONTENT_TYPE, "application/octet-stream")], converted).into_response()
		}
		Err(err) => {
			log::warn!("convert-to failed for '{file_name}' -> '{format}': {err:#}");
			(StatusCode::SERVICE_UNAVAILABLE, format!("conversion failed: {err:#}")).into_response()
		}
	}
}

async fn run_conversion(state: &AppState, file_name: &str, bytes: &[u8], format: &str) -> anyhow::Result<Vec<u8>> {
	let work_dir = std::env::temp_dir().join(format!("coedit-convert-{}", Uuid::new_v4()));
	tokio::fs::create_dir_all(&work_dir).await?;
	let source_path = work_dir.join(file_name);
	tokio::fs::write(&source_path, bytes).await?;

	let result = run_conversion_in(state, &source_path, format).await;
	tokio::fs::remove_dir_all(&work_dir).await.ok();
	result
}

async fn run_conversion_in(state: &AppState, source_path: &std::path::Path, format: &str) -> anyhow::Result<Vec<u8>> {
	let key = DocKey::from_uri("localhost", &format!("/convert/{}", Uuid::new_v4()));
	let storage = storage::build_storage(&format!("file://{}", source_path.display()), true)?;
	let broker = Arc::new(coedit_broker::DocumentBroker::new(
		key.clone(),
		format!("file://{}", source_path.display()),
		storage,
		&state.tile_cache_root(),
	));

	broker.load(source_path).await?;

	let session = state.server.next_session_id();
	let rx = broker.save_as_rendezvous().register(session);

	let worker_link = coedit_worker::LoggingWorkerLink::new();
	coedit_worker::WorkerLink::dispatch(&worker_link, session, key.as_str(), &format!("saveas format={format}"))?;

	let result = tokio::time::timeout(CONVERT_TIMEOUT, rx).await??;
	let converted_path = std::path::PathBuf::from(result.url.trim_start_matches("file://"));
	Ok(tokio::fs::read(&converted_path).await?)
}

fn bad_request(message: String) -> Response {
	(StatusCode::BAD_REQUEST, message).into_response()
}

/// `POST /insertfile`: stash an uploaded embedded-image (or similar)
/// payload under the requesting session's jail so the worker can read it by
/// path, returning the public URL the client later references in `paste`/
/// `insertfile` UNO commands.
pub async fn insert_file(State(state): State<AppState>, mut multipart: Multipart) -> Response {
	let mut jail_id = None;
	let mut file_bytes: Option<Bytes> = None;
	let mut file_name = None;

	loop {
		let field = match multipart.next_field().await {
			Ok(Some(field)) => field,
			Ok(None) => break,
			Err(err) => return bad_request(format!("malformed multipart body: {err}")),
		};
		match field.name().unwrap_or_default() {
			"jailId" => jail_id = field.text().await.ok(),
			"file" => {
				file_name = field.file_name().map(str::to_string);
				file_bytes = field.bytes().await.ok();
			}
			_ => {}
		}
	}

	let (Some(jail_id), Some(bytes)) = (jail_id, file_bytes) else {
		return bad_request("insertfile requires 'jailId' and 'file' parts".to_string());
	};
	let file_name = file_name.unwrap_or_else(|| format!("{}.png", Uuid::new_v4()));
	let child_id = Uuid::new_v4().simple().to_string();

	let dest_dir = state.jail_root().join(&jail_id).join("insertfile").join(&child_id);
	if let Err(err) = tokio::fs::create_dir_all(&dest_dir).await {
		return (StatusCode::INTERNAL_SERVER_ERROR, format!("staging insertfile payload: {err}")).into_response();
	}
	let dest_path = dest_dir.join(&file_name);
	if let Err(err) = tokio::fs::write(&dest_path, &bytes).await {
		return (StatusCode::INTERNAL_SERVER_ERROR, format!("writing insertfile payload: {err}")).into_response();
	}

	(StatusCode::OK, format!("{jail_id}/{child_id}/{file_name}")).into_response()
}

/// `GET /<jailId>/<childId>/<filename>`: serve back a file staged by
/// `insert_file`, or a document a `downloadas` command rendered into the
/// same per-child directory — both write under
/// `<jailRoot>/<jailId>/insertfile/<childId>/<filename>`.
pub async fn serve_jailed_file(
	State(state): State<AppState>,
	AxumPath((jail_id, child_id, filename)): AxumPath<(String, String, String)>,
) -> Response {
	let path = state.jail_root().join(&jail_id).join("insertfile").join(&child_id).join(&filename);
	match tokio::fs::read(&path).await {
		Ok(bytes) => ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response(),
		Err(err) => {
			log::debug!("serve_jailed_file: {path:?} not found: {err}");
			(StatusCode::NOT_FOUND, "not found").into_response()
		}
	}
}
