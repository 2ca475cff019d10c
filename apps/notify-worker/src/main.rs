//! Notify Worker - Entry Point
//!
//! Consumes domain events from the email and notification queues.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    notify_worker::run().await
}
