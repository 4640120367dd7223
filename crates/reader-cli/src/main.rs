mod cli;
mod crash;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}
