//! Fetches the palm detector and handpose estimator on first use.

use std::{
    fs,
    io::{Read, Write},
    path::Path,
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

const HANDPOSE_MODEL_URL: &str = "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/handpose_estimation_mediapipe_2023feb.onnx";
const PALM_DETECTOR_MODEL_URL: &str = "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/palm_detection_mediapipe_2023feb.onnx";

/// Makes sure the handpose model exists at `model_path`, downloading it with a
/// terminal progress bar when it does not.
pub fn ensure_handpose_model(model_path: &Path) -> anyhow::Result<()> {
    ensure_model(model_path, HANDPOSE_MODEL_URL, "handpose model")
}

pub fn ensure_palm_model(model_path: &Path) -> anyhow::Result<()> {
    ensure_model(model_path, PALM_DETECTOR_MODEL_URL, "palm detector")
}

fn ensure_model(model_path: &Path, url: &str, what: &str) -> anyhow::Result<()> {
    if model_path.exists() {
        log::debug!("{what} present at {}", model_path.display());
        return Ok(());
    }

    if let Some(parent) = model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    download_to_path(url, model_path, what)
        .with_context(|| format!("failed to download {what} to {}", model_path.display()))
}

fn download_to_path(url: &str, dest: &Path, what: &str) -> anyhow::Result<()> {
    log::info!("downloading {what} from {url} to {}", dest.display());

    let mut response = Client::new()
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let progress = create_progress_bar(response.content_length())?;

    // Write next to the destination and rename, so an interrupted download
    // never leaves a truncated model behind.
    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        progress.set_position(downloaded);
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    progress.finish_with_message(format!("{what} ready"));
    log::info!("downloaded {downloaded} bytes");
    Ok(())
}

fn create_progress_bar(total_size: Option<u64>) -> anyhow::Result<ProgressBar> {
    let pb = match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )?
                .progress_chars("=>-"),
            );
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} downloading model {bytes}",
            )?);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    };
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_model_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handpose.onnx");
        fs::write(&path, b"model").unwrap();

        ensure_handpose_model(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"model");
    }

    #[test]
    fn existing_palm_detector_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palm.onnx");
        fs::write(&path, b"palm").unwrap();

        ensure_palm_model(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"palm");
    }
}
