//! Coordination core for collaborative document editing: document brokers,
//! a worker pool standing in for sandboxed editor processes, a tile cache,
//! and the WebSocket/HTTP surface a browser client and an admin console
//! speak to it over.
//!
//! Library layout splits small focused modules (`admin`, `dispatcher`,
//! `http`, `worker_channel` implement concrete handlers; `cors`/`storage`/
//! `wire` are narrow helpers) from one lifecycle type, [`CoeditServer`],
//! that owns configuration ingestion, router composition, and graceful
//! start/stop.

pub mod admin;
pub mod config;
pub mod cors;
pub mod dispatcher;
pub mod http;
pub mod state;
pub mod storage;
pub mod wire;
pub mod worker_channel;

use crate::config::Config;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{BoxError, Router, response::IntoResponse};
use coedit_broker::{AdminModel, Server};
use coedit_derive::context;
use coedit_worker::{NamedPipeForker, WorkerPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::{ServiceBuilder, buffer::BufferLayer, limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer};
use tower_http::catch_panic::CatchPanicLayer;

/// How often the two periodic sampler tasks refresh the
/// `mem_stats`/`cpu_stats` sliding windows.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// How often the autosave sweep re-checks every open broker's idle/overdue
/// state. Independent of `idle_threshold`/`autosave_duration`, which decide
/// *whether* a given sweep actually saves a document.
const AUTOSAVE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Thin orchestration layer: stores the resolved configuration and shared
/// server state, composes the router and global middleware stack, and owns
/// the listening task's lifecycle. Idempotent start/stop, graceful shutdown
/// on `stop()`.
pub struct CoeditServer {
	config: Config,
	state: AppState,
	port: u16,
	exit_signal: Option<oneshot::Sender<()>>,
	join: Option<tokio::task::JoinHandle<()>>,
	samplers: Vec<tokio::task::JoinHandle<()>>,
}

impl CoeditServer {
	/// Build a server from a resolved `Config`, wiring the worker pool's
	/// forker stub and the admin model's sliding-window sizes from it.
	pub fn from_config(config: Config) -> Result<CoeditServer> {
		let forker = Arc::new(NamedPipeForker::new(config.forker_pipe_path()));
		let worker_pool = WorkerPool::new(forker, config.num_prespawn_children());
		let admin = AdminModel::with_window_sizes(config.mem_stats_size(), config.cpu_stats_size());
		let server = Server::with_admin(worker_pool, admin);
		let port = config.server.port.unwrap_or(9980);
		let state = AppState::new(server, config.clone());

		Ok(CoeditServer { config, state, port, exit_signal: None, join: None, samplers: Vec::new() })
	}

	fn router(&self) -> Router {
		Router::new()
			.route("/status", get(|| async { "ready!" }))
			.route("/hosting/discovery", get(http::hosting_discovery))
			.route("/convert-to", axum::routing::post(http::convert_to))
			.route("/insertfile", axum::routing::post(http::insert_file))
			.route("/lool/{doc_uri}/ws", get(dispatcher::handle_document_socket))
			.route("/lool/adminws", get(admin::handle_admin_socket))
			.route("/lool/getMetrics/{pid}", get(worker_channel::handle_worker_checkin))
			.route("/{jail_id}/{child_id}/{filename}", get(http::serve_jailed_file))
			.with_state(self.state.clone())
	}

	/// Build the router, apply CORS and the global backpressure/panic-
	/// catching stack, bind, and spawn the serving task plus the two
	/// periodic mem/cpu sampler tasks. Idempotent: restarts a running
	/// server by stopping it first.
	#[context("starting coedit server")]
	pub async fn start(&mut self) -> Result<()> {
		if self.exit_signal.is_some() || self.join.is_some() {
			self.stop().await;
		}

		log::info!("starting server");

		let cors_layer = cors::build_cors_layer(self.config.allowed_origins(), self.config.cors_max_age_seconds());
		let mut router = self.router().layer(ServiceBuilder::new().layer(cors_layer));

		// Global backpressure & protection layers, innermost to outermost:
		// LoadShed -> ConcurrencyLimit -> Buffer -> Timeout -> CatchPanic -> HandleError.
		let global_concurrency = 256usize;
		let global_buffer = 512usize;
		let request_timeout = Duration::from_secs(30);

		let overload_handler = HandleErrorLayer::new(|_err: BoxError| async move {
			let mut resp = (StatusCode::SERVICE_UNAVAILABLE, "server overloaded, try later").into_response();
			resp.headers_mut().insert("Retry-After", "2".parse().unwrap());
			Ok::<_, std::convert::Infallible>(resp)
		});

		let protection = ServiceBuilder::new()
			.layer(overload_handler)
			.layer(CatchPanicLayer::new())
			.layer(TimeoutLayer::new(request_timeout))
			.layer(BufferLayer::new(global_buffer))
			.layer(ConcurrencyLimitLayer::new(global_concurrency))
			.layer(LoadShedLayer::new());

		router = router.layer(protection);

		let addr = self.config.bind_addr();
		log::info!("server binding on {addr}");
		let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
		if self.port == 0 {
			self.port = listener.local_addr()?.port();
		}

		let (tx, rx) = oneshot::channel::<()>();
		let handle = tokio::spawn(async move {
			if let Err(err) = axum::serve(listener, router.into_make_service())
				.with_graceful_shutdown(async {
					rx.await.ok();
				})
				.await
			{
				log::error!("server task exited with error: {err}");
			}
		});

		self.exit_signal = Some(tx);
		self.join = Some(handle);
		self.samplers = self.spawn_samplers();
		self.samplers.push(self.spawn_autosave_sweep());

		if let Err(err) = self.state.server.worker_pool().top_up() {
			log::warn!("initial worker pool top-up failed: {err:#}");
		}

		Ok(())
	}

	/// Two independent periodic tasks sampling memory and CPU into the
	/// admin model's sliding windows.
	fn spawn_samplers(&self) -> Vec<tokio::task::JoinHandle<()>> {
		let admin_mem = self.state.server.clone();
		let mem_task = tokio::spawn(async move {
			let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
			loop {
				interval.tick().await;
				admin_mem.admin().sample_mem();
			}
		});

		let admin_cpu = self.state.server.clone();
		let cpu_task = tokio::spawn(async move {
			let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
			loop {
				interval.tick().await;
				admin_cpu.admin().sample_cpu();
			}
		});

		vec![mem_task, cpu_task]
	}

	/// Periodically offers every open broker its autosave decision. Each
	/// broker decides for itself whether it's actually due (idle-since-
	/// activity, or the long overdue threshold); this task is just the
	/// clock that keeps asking.
	fn spawn_autosave_sweep(&self) -> tokio::task::JoinHandle<()> {
		let server = self.state.server.clone();
		let idle_threshold = self.config.idle_threshold();
		let autosave_duration = self.config.autosave_duration();
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(AUTOSAVE_POLL_INTERVAL);
			loop {
				interval.tick().await;
				for broker in server.brokers() {
					match broker.autosave(idle_threshold, autosave_duration, false).await {
						Ok(true) => log::info!("autosaved '{}'", broker.key()),
						Ok(false) => {}
						Err(err) => log::warn!("autosave failed for '{}': {err:#}", broker.key()),
					}
				}
			}
		})
	}

	/// Force-save every modified document. Called on graceful shutdown so
	/// in-flight edits aren't lost to the idle/overdue autosave timers not
	/// having fired yet.
	async fn force_save_all(&self) {
		for broker in self.state.server.brokers() {
			match broker.autosave(Duration::ZERO, Duration::ZERO, true).await {
				Ok(true) => log::info!("force-saved '{}' on shutdown", broker.key()),
				Ok(false) => {}
				Err(err) => log::warn!("force-save failed for '{}' on shutdown: {err:#}", broker.key()),
			}
		}
	}

	/// Trigger graceful shutdown and wait (with a bound) for the server
	/// task and the sampler tasks to finish. Idempotent.
	pub async fn stop(&mut self) {
		if self.exit_signal.is_none() && self.join.is_none() {
			return;
		}

		log::info!("stopping server");
		self.force_save_all().await;
		if let Some(tx) = self.exit_signal.take() {
			let _ = tx.send(());
		}

		if let Some(handle) = self.join.take() {
			match tokio::time::timeout(Duration::from_secs(10), handle).await {
				Ok(join_result) => {
					if let Err(err) = join_result {
						log::warn!("server task join error: {err}");
					}
				}
				Err(_) => log::warn!("server task did not shut down within timeout; continuing"),
			}
		}

		for sampler in self.samplers.drain(..) {
			sampler.abort();
		}
	}

	#[must_use]
	pub fn get_port(&self) -> u16 {
		self.port
	}

	#[must_use]
	pub fn state(&self) -> &AppState {
		&self.state
	}
}
