use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::asset::MediaType;

/// target raster format of the transform engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// lossless, quality is ignored
    #[default]
    Png,
    #[value(alias = "jpg")]
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn is_lossy(self) -> bool {
        !matches!(self, OutputFormat::Png)
    }

    pub fn media_type(self) -> MediaType {
        match self {
            OutputFormat::Png => MediaType::Png,
            OutputFormat::Jpeg => MediaType::Jpeg,
            OutputFormat::Webp => MediaType::Webp,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }
}

/// PNG compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    /// fastest encoding, larger files
    #[default]
    Fast,
    /// smaller files, slower encoding
    Small,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
    A3,
}

impl PageSize {
    /// portrait (width, height) in millimetres
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::A3 => (297.0, 420.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// how each image is re-encoded before it is embedded in the PDF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedFormat {
    /// DCT-compressed, alpha flattened onto black
    #[default]
    Jpeg,
    /// deflate-compressed pixels, alpha kept as a soft mask
    Lossless,
}

/// expand dirs in input list into sorted image files; `keep` filters
/// directory entries only, explicit files are always taken
pub fn expand_image_paths(
    paths: &[PathBuf],
    keep: impl Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Cannot read directory: {}", path.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|ext| MediaType::from_extension(ext).is_some())
                        && keep(p.as_path())
                })
                .collect();
            entries.sort();
            anyhow::ensure!(
                !entries.is_empty(),
                "No image files found in {}",
                path.display()
            );
            result.extend(entries);
        } else {
            result.push(path.clone());
        }
    }
    Ok(result)
}
