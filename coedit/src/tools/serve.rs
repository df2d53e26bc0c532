use anyhow::{Context, Result};
use coedit::CoeditServer;
use coedit::config::Config;
use std::path::PathBuf;
use tokio::time::{Duration, sleep};

#[derive(clap::Args, Debug)]
#[command(disable_version_flag = true)]
pub struct Subcommand {
	/// Path to a YAML configuration file.
	#[arg(short = 'c', long, value_name = "FILE", display_order = 0)]
	pub config: Option<PathBuf>,

	/// Serve via socket ip. Default: 0.0.0.0
	#[arg(short = 'i', long, display_order = 0)]
	pub ip: Option<String>,

	/// Serve via port. Default: 9980
	#[arg(short, long, display_order = 0)]
	pub port: Option<u16>,

	/// Shut down automatically after x milliseconds. Used by tests.
	#[arg(long, display_order = 4)]
	pub auto_shutdown: Option<u64>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let mut config = if let Some(config_path) = &arguments.config {
		Config::from_path(config_path).context("loading server configuration")?
	} else {
		Config::default()
	};

	if let Some(ip) = &arguments.ip {
		config.server.ip = Some(ip.clone());
	}
	if let Some(port) = arguments.port {
		config.server.port = Some(port);
	}

	let mut server = CoeditServer::from_config(config)?;
	server.start().await?;
	log::info!("listening on port {}", server.get_port());

	if let Some(milliseconds) = arguments.auto_shutdown {
		sleep(Duration::from_millis(milliseconds)).await;
	} else {
		loop {
			sleep(Duration::from_secs(60)).await;
		}
	}

	server.stop().await;
	Ok(())
}
