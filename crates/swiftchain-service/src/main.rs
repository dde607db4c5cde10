//! Main entry point for the SwiftChain service.
//!
//! By default the binary serves the HTTP API. The `watch` and `history`
//! subcommands reuse the same engine to follow a submitted transfer from the
//! terminal and to inspect or export the local transaction history.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use swiftchain_config::Config;
use swiftchain_core::{HistoryFilter, PollOutcome, SwiftChainEngine};
use swiftchain_types::{Currency, TransferStatus};

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the SwiftChain service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "SWIFTCHAIN_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
	/// Serve the HTTP API (default)
	Serve,
	/// Poll a submitted transaction until it confirms, fails or times out
	Watch {
		/// Transaction hash (0x followed by 64 hex characters)
		#[arg(long)]
		hash: String,
		/// Recipient address, recorded when the hash is not yet in history
		#[arg(long)]
		to: Option<String>,
		/// Sender address, recorded when the hash is not yet in history
		#[arg(long)]
		from: Option<String>,
		/// Transferred amount
		#[arg(long)]
		amount: Option<Decimal>,
		/// Transferred asset. Defaults to what the chain reports.
		#[arg(long)]
		currency: Option<Currency>,
	},
	/// List or export local transaction history
	History {
		/// Only show transfers with this status
		#[arg(long)]
		status: Option<TransferStatus>,
		/// Case-insensitive search over hash, addresses, amount and currency
		#[arg(long)]
		search: Option<String>,
		/// Write matching transfers as CSV to this file
		#[arg(long)]
		export: Option<PathBuf>,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config, None).await?);

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(engine).await?,
		Command::Watch {
			hash,
			to,
			from,
			amount,
			currency,
		} => watch(&engine, hash, to, from, amount, currency).await?,
		Command::History {
			status,
			search,
			export,
		} => history(&engine, HistoryFilter { search, status }, export).await?,
	}

	Ok(())
}

async fn serve(engine: Arc<SwiftChainEngine>) -> Result<(), Box<dyn std::error::Error>> {
	let Some(api_config) = engine.config().api.clone().filter(|api| api.enabled) else {
		tracing::warn!("API server is disabled in configuration, nothing to serve");
		return Ok(());
	};

	let cleanup = engine.spawn_storage_cleanup();
	tracing::info!("Started SwiftChain");

	let result = server::start_server(api_config, engine).await;
	cleanup.abort();

	tracing::info!("Stopped SwiftChain");
	result
}

async fn watch(
	engine: &SwiftChainEngine,
	hash: String,
	to: Option<String>,
	from: Option<String>,
	amount: Option<Decimal>,
	currency: Option<Currency>,
) -> Result<(), Box<dyn std::error::Error>> {
	let known = engine
		.history()
		.list()
		.await?
		.into_iter()
		.find(|r| r.hash.eq_ignore_ascii_case(&hash));

	let record = match known {
		Some(record) => record,
		None => {
			let mut record = engine.lookup_transaction(&hash).await?;
			if let Some(to) = to {
				record.to = to;
			}
			if let Some(from) = from {
				record.from = from;
			}
			if let Some(amount) = amount {
				record.amount = amount;
			}
			if let Some(currency) = currency {
				record.currency = currency;
			}
			engine.history().record(&record).await?;
			record
		},
	};

	if record.status.is_terminal() {
		println!("{} is already {}", record.hash, record.status);
		return Ok(());
	}

	let report = engine.watch(record).await;
	match report.outcome {
		PollOutcome::TimedOut => println!(
			"{} still pending after {} confirmations, check again later",
			report.record.hash, report.record.confirmations
		),
		_ => println!("{}", serde_json::to_string_pretty(&report.record)?),
	}
	Ok(())
}

async fn history(
	engine: &SwiftChainEngine,
	filter: HistoryFilter,
	export: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
	if let Some(path) = export {
		let csv = engine.history().export_csv(&filter).await?;
		tokio::fs::write(&path, csv).await?;
		tracing::info!("Exported history to {}", path.display());
		return Ok(());
	}

	let records = engine.history().filter(&filter).await?;
	for record in &records {
		println!(
			"{}  {:<9}  {:>14} {:<4}  {}  {}",
			record.timestamp.format("%Y-%m-%d %H:%M:%S"),
			record.status.as_str(),
			record.amount,
			record.currency.as_str(),
			record.to,
			record.hash
		);
	}

	let summary = engine.history().summary().await?;
	println!(
		"{} shown, {} total ({} confirmed, {} pending, {} failed)",
		records.len(),
		summary.total,
		summary.confirmed,
		summary.pending,
		summary.failed
	);
	Ok(())
}
