use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = chinchilla_api::Args::parse();

	chinchilla_api::run(args).await
}
