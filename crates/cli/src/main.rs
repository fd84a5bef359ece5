use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    docchat_cli::main_entry().await
}
