#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lecture_player_lib::run().await
}
