//! Settings snapshots for both engines.
//!
//! Every settings type is a plain value. Changes go through a `*Patch`
//! (all fields optional) and `merged`, which returns a new value, so an
//! engine call always sees the exact snapshot it was handed.

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::parse::{EmbedFormat, Orientation, OutputFormat, PageSize, PngCompression};

/// clockwise rotation in quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// exact (cos, sin) of the clockwise angle in a y-down frame
    pub fn cos_sin(self) -> (f64, f64) {
        match self {
            Rotation::None => (1.0, 0.0),
            Rotation::Cw90 => (0.0, 1.0),
            Rotation::Cw180 => (-1.0, 0.0),
            Rotation::Cw270 => (0.0, -1.0),
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = Error;

    /// any multiple of 90, normalized modulo 360
    fn try_from(degrees: i32) -> Result<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            _ => Err(Error::invalid(format!(
                "rotation must be a multiple of 90 degrees, got {}",
                degrees
            ))),
        }
    }
}

impl From<Rotation> for i32 {
    fn from(r: Rotation) -> i32 {
        r.degrees() as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSettings {
    pub output_format: OutputFormat,
    /// in (0, 1], only meaningful for lossy formats
    pub quality: f32,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub maintain_aspect_ratio: bool,
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub png_compression: PngCompression,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Png,
            quality: 0.9,
            target_width: None,
            target_height: None,
            maintain_aspect_ratio: true,
            rotation: Rotation::None,
            flip_horizontal: false,
            flip_vertical: false,
            png_compression: PngCompression::Fast,
        }
    }
}

impl TransformSettings {
    pub fn merged(&self, patch: &TransformPatch) -> Self {
        Self {
            output_format: patch.format.unwrap_or(self.output_format),
            quality: patch.quality.unwrap_or(self.quality),
            target_width: patch.width.unwrap_or(self.target_width),
            target_height: patch.height.unwrap_or(self.target_height),
            maintain_aspect_ratio: patch
                .maintain_aspect_ratio
                .unwrap_or(self.maintain_aspect_ratio),
            rotation: patch.rotation.unwrap_or(self.rotation),
            flip_horizontal: patch.flip_horizontal.unwrap_or(self.flip_horizontal),
            flip_vertical: patch.flip_vertical.unwrap_or(self.flip_vertical),
            png_compression: patch.png_compression.unwrap_or(self.png_compression),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_format.is_lossy() {
            check_quality(self.quality)?;
        }
        if self.target_width == Some(0) || self.target_height == Some(0) {
            return Err(Error::invalid("target dimensions must be positive"));
        }
        Ok(())
    }
}

/// partial update of [`TransformSettings`]; `width: null` clears a target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TransformPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f32>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub width: Option<Option<u32>>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub height: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintain_aspect_ratio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flip_horizontal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flip_vertical: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png_compression: Option<PngCompression>,
}

impl From<&TransformSettings> for TransformPatch {
    fn from(s: &TransformSettings) -> Self {
        Self {
            format: Some(s.output_format),
            quality: Some(s.quality),
            width: Some(s.target_width),
            height: Some(s.target_height),
            maintain_aspect_ratio: Some(s.maintain_aspect_ratio),
            rotation: Some(s.rotation),
            flip_horizontal: Some(s.flip_horizontal),
            flip_vertical: Some(s.flip_vertical),
            png_compression: Some(s.png_compression),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayoutSettings {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub margin_mm: f64,
    /// caps how many images share a page, and sets the slot height budget
    pub images_per_page: u32,
    /// false places images at their natural size (`dpi`), shrinking only
    pub fit_to_page: bool,
    pub gap_mm: f64,
    pub dpi: u32,
}

impl Default for PageLayoutSettings {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin_mm: 20.0,
            images_per_page: 1,
            fit_to_page: true,
            gap_mm: 10.0,
            dpi: 300,
        }
    }
}

impl PageLayoutSettings {
    /// page (width, height) in mm after applying orientation
    pub fn page_dimensions_mm(&self) -> (f64, f64) {
        let (w, h) = self.page_size.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    pub fn merged(&self, patch: &LayoutPatch) -> Self {
        Self {
            page_size: patch.page_size.unwrap_or(self.page_size),
            orientation: patch.orientation.unwrap_or(self.orientation),
            margin_mm: patch.margin_mm.unwrap_or(self.margin_mm),
            images_per_page: patch.images_per_page.unwrap_or(self.images_per_page),
            fit_to_page: patch.fit_to_page.unwrap_or(self.fit_to_page),
            gap_mm: patch.gap_mm.unwrap_or(self.gap_mm),
            dpi: patch.dpi.unwrap_or(self.dpi),
        }
    }

    /// margin problems are reported by the layout engine itself
    pub fn validate(&self) -> Result<()> {
        if self.images_per_page == 0 {
            return Err(Error::invalid("images per page must be at least 1"));
        }
        if !self.gap_mm.is_finite() || self.gap_mm < 0.0 {
            return Err(Error::invalid(format!(
                "gap must be a non-negative length, got {}",
                self.gap_mm
            )));
        }
        if self.dpi == 0 {
            return Err(Error::invalid("dpi must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct LayoutPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<PageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_to_page: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
}

impl From<&PageLayoutSettings> for LayoutPatch {
    fn from(s: &PageLayoutSettings) -> Self {
        Self {
            page_size: Some(s.page_size),
            orientation: Some(s.orientation),
            margin_mm: Some(s.margin_mm),
            images_per_page: Some(s.images_per_page),
            fit_to_page: Some(s.fit_to_page),
            gap_mm: Some(s.gap_mm),
            dpi: Some(s.dpi),
        }
    }
}

/// conversion applied to every image before it is embedded in a document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EmbedSettings {
    pub format: EmbedFormat,
    pub quality: f32,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self {
            format: EmbedFormat::Jpeg,
            quality: 0.92,
        }
    }
}

impl EmbedSettings {
    pub fn validate(&self) -> Result<()> {
        match self.format {
            EmbedFormat::Jpeg => check_quality(self.quality),
            EmbedFormat::Lossless => Ok(()),
        }
    }
}

fn check_quality(q: f32) -> Result<()> {
    if q.is_finite() && q > 0.0 && q <= 1.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "quality must be in (0, 1], got {}",
            q
        )))
    }
}

fn double_option<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// settings file: each section is a partial update over the defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Preset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<EmbedSettings>,
}

impl Preset {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preset {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse preset {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize preset")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write preset {}", path.display()))
    }

    pub fn transform_settings(&self) -> TransformSettings {
        match &self.transform {
            Some(patch) => TransformSettings::default().merged(patch),
            None => TransformSettings::default(),
        }
    }

    pub fn layout_settings(&self) -> PageLayoutSettings {
        match &self.layout {
            Some(patch) => PageLayoutSettings::default().merged(patch),
            None => PageLayoutSettings::default(),
        }
    }

    pub fn embed_settings(&self) -> EmbedSettings {
        self.embed.unwrap_or_default()
    }
}
