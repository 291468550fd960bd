use clap::Parser;

use jahreskarte_lib::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jahreskarte_lib::run(Args::parse()).await
}
