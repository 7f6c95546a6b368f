//! This example runs the whole multi-view workflow:
//! 1. Reading credentials and defaults from the environment (or a `.env` file).
//! 2. Submitting every image in a directory as one task.
//! 3. Polling until the task finishes, printing progress. Ctrl-C cancels.
//! 4. Downloading the model into `HITEM3D_OUTPUT_DIR`.
//!
//! To run this example, you must have `HITEM3D_CLIENT_ID` and `HITEM3D_CLIENT_SECRET` set.
//!
//! Usage:
//! `cargo run --example multi_view_to_model [IMAGE_DIR]`
//!
//! `IMAGE_DIR` defaults to `data/input`.

use hitem3d::{CancellationToken, Hitem3dConfig, TaskOrchestrator};
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Hitem3dConfig::from_env()?;
    let params = config.default_params.clone();
    let image_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data").join("input"));

    if !image_dir.is_dir() {
        anyhow::bail!("Image folder not found or not a directory: {}", image_dir.display());
    }

    let orchestrator = TaskOrchestrator::new(config)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopping...");
            on_ctrl_c.cancel();
        }
    });

    println!(
        "Submitting images from `{}` (model {}, resolution {}, format {})...",
        image_dir.display(),
        params.model,
        params.resolution,
        params.format.extension()
    );
    let outcome = orchestrator
        .run(
            &image_dir,
            &params,
            |update| println!("[{:>3.0}%] {}", update.progress * 100.0, update.state),
            &cancel,
        )
        .await;

    println!("\n{}", outcome.status_message());
    Ok(())
}
