use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use adlens_service::{AdlensService, Snapshot};

#[derive(Debug, Parser)]
#[command(version, about = "Sponsored-content aware blog search.", rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Keyword to search for.
	pub query: String,
	/// 1-based result page.
	#[arg(long, default_value_t = 1)]
	pub page: u32,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = adlens_config::load(&args.config)?;

	init_tracing(&config)?;

	let service = AdlensService::new(config);
	let mut snapshots = service.snapshots();
	let snapshot = if args.page == 1 {
		service.search(&args.query).await?
	} else {
		service.change_page(&args.query, args.page).await?
	};
	let snapshot = settle(&mut snapshots, snapshot).await;

	render(&snapshot);

	Ok(())
}

// Classifications may still be arriving over the push channel. Wait until
// nothing is pending; the deadline resolver bounds this wait.
async fn settle(
	snapshots: &mut tokio::sync::watch::Receiver<Snapshot>,
	mut latest: Snapshot,
) -> Snapshot {
	while latest.pending_count() > 0 {
		if snapshots.changed().await.is_err() {
			break;
		}

		latest = snapshots.borrow_and_update().clone();
	}

	latest
}

fn render(snapshot: &Snapshot) {
	println!(
		"\"{}\" page {}: {} of {} results, {} sponsored",
		snapshot.query,
		snapshot.page,
		snapshot.posts.len(),
		snapshot.total_results,
		snapshot.sponsored_results,
	);

	for post in &snapshot.posts {
		let marker = if post.is_sponsored { "[ad]" } else { "[--]" };

		println!(
			"{marker} {:>5.1}% {} <{}>",
			post.sponsor_probability * 100.0,
			post.title,
			post.link,
		);
	}

	if let Some(error) = &snapshot.error {
		eprintln!("warning: {error}");
	}
}

fn init_tracing(config: &adlens_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}
