use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = adlens_cli::Args::parse();

	adlens_cli::run(args).await
}
