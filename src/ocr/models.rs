//! Download-once cache for pre-trained model files.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Return the local path of `remote_path`, downloading it from `base_url`
/// into `models_dir` if it is not cached yet.
pub fn ensure_model(models_dir: &Path, base_url: &str, remote_path: &str) -> Result<PathBuf> {
    let filename = Path::new(remote_path)
        .file_name()
        .ok_or_else(|| anyhow!("Invalid model path: {}", remote_path))?;
    let model_path = models_dir.join(filename);

    if model_path.exists() {
        return Ok(model_path);
    }

    std::fs::create_dir_all(models_dir)
        .with_context(|| format!("Failed to create model directory {}", models_dir.display()))?;

    let url = format!("{}/{}", base_url.trim_end_matches('/'), remote_path);
    tracing::info!(model = %remote_path, "Downloading model...");

    let response = ureq::get(&url)
        .call()
        .map_err(|e| anyhow!("Failed to download model {}: {}", remote_path, e))?;

    // Write beside the target and rename so an interrupted download is never reused
    let partial_path = model_path.with_extension("part");
    let mut file = std::fs::File::create(&partial_path)?;
    std::io::copy(&mut response.into_reader(), &mut file)
        .with_context(|| format!("Failed to write {}", partial_path.display()))?;
    std::fs::rename(&partial_path, &model_path)?;

    tracing::info!(model = %remote_path, path = ?model_path, "Model downloaded");
    Ok(model_path)
}
