//! This example demonstrates a wait-and-download workflow:
//! 1. Taking an existing task ID (and optional format code) from the command line.
//! 2. Polling the task status until it completes.
//! 3. Downloading the resulting model to a temporary directory if the task was successful.
//!
//! To run this example, you must have `HITEM3D_CLIENT_ID` and `HITEM3D_CLIENT_SECRET` set.
//!
//! Usage:
//! `cargo run --example wait_and_download <TASK_ID> [FORMAT_CODE]`

use hitem3d::{CancellationToken, Hitem3dClient, PollConfig, StatusPoller, TerminalState};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if it exists.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let client = Hitem3dClient::new(None)?;

    // 1. Get the task ID from command-line arguments.
    let task_id = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Please provide a task ID as a command-line argument."))?;
    let format_code = env::args().nth(2).unwrap_or_else(|| "2".to_string());

    // 2. Wait for the task to complete
    println!("\nWaiting for task `{}` to complete...", task_id);
    let poller = StatusPoller::new(client.clone(), PollConfig::default());
    let final_state = match poller
        .poll_until_terminal(
            &task_id,
            |update| println!("Task state: {}, progress: {:.0}%", update.state, update.progress * 100.0),
            &CancellationToken::new(),
        )
        .await
    {
        Ok(state) => state,
        Err(e) => {
            eprintln!("\nError waiting for task: {}", e);
            return Ok(()); // Exit gracefully
        }
    };

    // 3. Check final state and download the model to a temporary directory
    match final_state {
        TerminalState::Success { url } => {
            let temp_dir = tempfile::Builder::new()
                .prefix("hitem3d_download_")
                .tempdir()?;
            println!(
                "\nTask completed successfully! Downloading model to temporary directory: {}",
                temp_dir.path().display()
            );

            match client
                .download_model(&url, temp_dir.path(), &format_code, &task_id)
                .await
            {
                Ok(path) => println!("\nSuccessfully downloaded: {}", path.display()),
                Err(e) => eprintln!("\nFailed to download model: {}", e),
            }
            // Keep the directory around for the user to inspect.
            let _ = temp_dir.keep();
        }
        other => println!("\nTask finished without a model: {:?}", other),
    }

    Ok(())
}
