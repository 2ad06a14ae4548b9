#[tokio::main]
async fn main() -> anyhow::Result<()> {
    urlist::run().await
}
