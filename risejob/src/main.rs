#[tokio::main]
async fn main() -> anyhow::Result<()> {
    risejob_lib::run().await
}
