//! Exercises a running session control service and reports which checks passed.
//!
//! Settings come from `client.toml` and `CLIENT_*` variables, e.g.
//! `CLIENT_API_BASE_URL=http://localhost:8764 CLIENT_API_KEY=... session_check`.

use anyhow::Result;
use avatar_session_mock::client::{run_session_checks, SessionClient};
use avatar_session_mock::config::ClientConfig;
use avatar_session_mock::telemetry::{init_tracing, DEFAULT_CLIENT_FILTER};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    init_tracing(DEFAULT_CLIENT_FILTER)?;

    let config = ClientConfig::load()?;
    config.validate()?;

    info!("Checking session API at {}", config.api_base_url);
    let client = SessionClient::new(&config.api_base_url, &config.api_key)?;
    let results = run_session_checks(&client, &config.avatar_id).await;

    let passed = results.iter().filter(|r| r.passed()).count();
    println!();
    println!("Session API checks");
    println!("==================");
    for result in &results {
        match &result.outcome {
            Ok(()) => println!("PASS  {}", result.name),
            Err(reason) => println!("FAIL  {}: {}", result.name, reason),
        }
    }
    println!("{}/{} passed", passed, results.len());

    if passed == results.len() {
        info!("All checks passed");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{} check(s) failed", results.len() - passed);
        Ok(ExitCode::FAILURE)
    }
}
