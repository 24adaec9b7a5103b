use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::asset::ImageAsset;
use crate::batch::CancelToken;
use crate::error::Error;
use crate::settings::TransformSettings;
use crate::transform::Converter;

/// `photo.jpg` -> `<dir>/photo_converted.png`
pub fn output_path(input: &Path, output_dir: Option<&Path>, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let dir = output_dir
        .or_else(|| input.parent())
        .unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}_converted.{}", stem, extension))
}

/// true for files this command writes (`x_converted`, `x_converted_2`), so a
/// rerun over a directory skips them
pub fn is_converted_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| {
            let base = match stem.rsplit_once('_') {
                Some((head, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => head,
                _ => stem,
            };
            base.ends_with("_converted")
        })
}

/// `base`, or `<stem>_1.<ext>`, `<stem>_2.<ext>`, ... if an earlier item of
/// the same run already wrote there
fn claim_path(base: PathBuf, written: &mut HashSet<PathBuf>) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = base.clone();
    let mut n = 1;
    while written.contains(&candidate) {
        candidate = base.with_file_name(format!("{}_{}.{}", stem, n, ext));
        n += 1;
    }
    written.insert(candidate.clone());
    candidate
}

/// Convert every image in order with one settings snapshot. Failed items
/// are reported and skipped; the command fails afterwards if any did.
pub fn convert_images(
    images: &[PathBuf],
    output: Option<&Path>,
    settings: &TransformSettings,
    cancel: CancelToken,
) -> Result<()> {
    let to_stdout = output == Some(Path::new("-"));
    anyhow::ensure!(
        !to_stdout || images.len() == 1,
        "stdout output (-o -) requires a single input image, got {}",
        images.len()
    );
    if let Some(dir) = output.filter(|_| !to_stdout) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let total = images.len();
    let ext = settings.output_format.extension();
    info!("Converting {} image(s) to {}", total, ext);
    let start = std::time::Instant::now();

    let converter = Converter::default();
    let sources = images
        .iter()
        .enumerate()
        .map(|(i, path)| ImageAsset::load(i, path));

    let mut done = 0;
    let mut written_paths = HashSet::new();
    let mut errors: Vec<(usize, anyhow::Error)> = Vec::new();
    for item in converter.batch(sources, settings, cancel) {
        if let Err(Error::Cancelled) = item.result {
            warn!("Cancelled after {} of {} images", done, total);
            return Err(Error::Cancelled.into());
        }
        let input = &images[item.index];
        let encoded = match item.result {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("{}: {}", input.display(), e);
                errors.push((item.index, e.into()));
                continue;
            }
        };

        let written = if to_stdout {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            out.write_all(&encoded.bytes)
                .and_then(|_| out.flush())
                .context("Failed to write image to stdout")
                .map(|_| "-".to_string())
        } else {
            let path = claim_path(output_path(input, output, ext), &mut written_paths);
            std::fs::write(&path, &encoded.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))
                .map(|_| path.display().to_string())
        };

        match written {
            Ok(name) => {
                done += 1;
                info!(
                    "  [{}/{}] {} -> {} ({}x{} {}, {} bytes)",
                    item.index + 1,
                    total,
                    input.display(),
                    name,
                    encoded.width,
                    encoded.height,
                    encoded.media_type.mime(),
                    encoded.byte_len()
                );
            }
            Err(e) => {
                warn!("{:#}", e);
                errors.push((item.index, e));
            }
        }
    }

    let count = errors.len();
    if let Some((index, err)) = errors.into_iter().next() {
        return Err(err.context(format!(
            "Failed on {} ({} total error{})",
            images[index].display(),
            count,
            if count == 1 { "" } else { "s" }
        )));
    }

    info!(
        "Done. {} images in {:.2}s",
        done,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
