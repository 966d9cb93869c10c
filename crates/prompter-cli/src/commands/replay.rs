//! `prompter replay` — re-drive a recorded cassette and verify it.

use std::path::Path;

use prompter_core::vcr::replay_cassette;

pub async fn run(cassette: &Path) -> Result<(), String> {
    replay_cassette(cassette, super::default_loader())
        .await
        .map_err(|e| format!("Replay failed: {e}"))?;
    println!("✓ Replayed {} successfully", cassette.display());
    Ok(())
}
