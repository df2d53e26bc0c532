use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// Path to a document's tile-cache directory (as named by `cache_dir_fanout`).
	#[arg(required = true)]
	cache_dir: PathBuf,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let report = probe_cache_dir(&arguments.cache_dir)
		.with_context(|| format!("probing tile cache at {:?}", arguments.cache_dir))?;
	println!("tiles:    {}", report.tile_count);
	println!("sidecars: {}", report.sidecar_count);
	println!("bytes:    {}", report.total_bytes);
	Ok(())
}

struct CacheReport {
	tile_count: usize,
	sidecar_count: usize,
	total_bytes: u64,
}

fn probe_cache_dir(root: &std::path::Path) -> Result<CacheReport> {
	let mut report = CacheReport { tile_count: 0, sidecar_count: 0, total_bytes: 0 };
	count_dir(&root.join("tiles"), &mut report.tile_count, &mut report.total_bytes)?;
	count_dir(&root.join("sidecar"), &mut report.sidecar_count, &mut report.total_bytes)?;
	Ok(report)
}

fn count_dir(dir: &std::path::Path, count: &mut usize, bytes: &mut u64) -> Result<()> {
	if !dir.exists() {
		return Ok(());
	}
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		if entry.file_type()?.is_file() {
			*count += 1;
			*bytes += entry.metadata()?.len();
		}
	}
	Ok(())
}
