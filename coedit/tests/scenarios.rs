//! End-to-end HTTP surface checks against a real `CoeditServer`, run with a
//! zero-target worker pool and a throwaway forker socket path so nothing
//! here depends on an actual sandboxed editor process.
//!
//! These exercise the router, CORS, and protection-layer stack wired up in
//! `CoeditServer::start`, complementing the handler-level `#[cfg(test)]`
//! coverage in `src/http.rs` and the dispatcher's gating unit tests.

use coedit::CoeditServer;
use coedit::config::Config;

async fn started_server(forker_socket: &str) -> CoeditServer {
	let mut config = Config::default();
	config.server.ip = Some("127.0.0.1".to_string());
	config.server.port = Some(0);
	config.worker_pool.forker_pipe_path = Some(forker_socket.into());
	let mut server = CoeditServer::from_config(config).unwrap();
	server.start().await.unwrap();
	server
}

#[tokio::test]
async fn status_and_discovery_routes_are_reachable() {
	let mut server = started_server("/tmp/coedit-it-discovery.sock").await;
	let port = server.get_port();

	let status = reqwest::get(format!("http://127.0.0.1:{port}/status")).await.unwrap();
	assert_eq!(status.status(), 200);
	assert_eq!(status.text().await.unwrap(), "ready!");

	let discovery = reqwest::get(format!("http://127.0.0.1:{port}/hosting/discovery")).await.unwrap();
	assert_eq!(discovery.status(), 200);
	let body = discovery.text().await.unwrap();
	assert!(body.contains("wopi-discovery"));

	server.stop().await;
}

#[tokio::test]
async fn jailed_file_route_reports_missing_files_as_404() {
	let mut server = started_server("/tmp/coedit-it-jailed.sock").await;
	let port = server.get_port();

	let response = reqwest::get(format!("http://127.0.0.1:{port}/nosuchjail/nosuchchild/missing.png")).await.unwrap();
	assert_eq!(response.status(), 404);

	server.stop().await;
}

/// S6 (convert-to): a request without a multipart body fails extraction
/// before the stub worker is ever asked to do anything, confirming the route
/// is wired all the way through axum's protection-layer stack rather than
/// silently 404ing or panicking under `CatchPanicLayer`.
#[tokio::test]
async fn convert_to_rejects_a_non_multipart_body() {
	let mut server = started_server("/tmp/coedit-it-convert.sock").await;
	let port = server.get_port();

	let client = reqwest::Client::new();
	let response = client
		.post(format!("http://127.0.0.1:{port}/convert-to"))
		.body("not a multipart body")
		.send()
		.await
		.unwrap();
	assert!(response.status().is_client_error(), "expected a 4xx rejection, got {}", response.status());

	server.stop().await;
}
