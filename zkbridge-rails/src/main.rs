//! zkbridge rail service
//!
//! Entry point for the zkbridge HTTP API.

use zkbridge_rails::main_entry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    main_entry::run_server().await
}
