//! Redemptions Worker Service - Entry Point
//!
//! Background worker that executes subscription redemptions.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    zerg_redemptions_worker::run().await
}
