use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pulse_ingest::Args::parse();

	pulse_ingest::run(args).await
}
