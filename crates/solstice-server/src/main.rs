use clap::Parser;
use solstice_engine::logging::init_logging;
use solstice_server::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.logging());

    if let Err(err) = solstice_server::run(args).await {
        log::error!("{err:#}");
        return Err(err);
    }
    Ok(())
}
