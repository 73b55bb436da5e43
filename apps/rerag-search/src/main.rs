// crates.io
use clap::Parser;
// self
use rerag_search::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	rerag_search::run(args).await
}
