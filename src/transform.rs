use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use log::debug;
use parking_lot::Mutex;
use std::io::Write;

use crate::asset::{ImageAsset, MediaType};
use crate::error::{Error, Result};
use crate::geometry::resolve_dimensions;
use crate::parse::{OutputFormat, PngCompression};
use crate::raster::{Rasterizer, SoftwareRasterizer, TransformPlan};
use crate::settings::TransformSettings;

/// re-encoded output of one transform
#[derive(Debug, Clone)]
pub struct EncodedResult {
    pub width: u32,
    pub height: u32,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
}

impl EncodedResult {
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Transform engine. Calls on one converter never overlap: a second
/// `transform` waits until the one in flight has finished.
pub struct Converter {
    rasterizer: Box<dyn Rasterizer + Send + Sync>,
    in_flight: Mutex<()>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(SoftwareRasterizer::default())
    }
}

impl Converter {
    pub fn new(rasterizer: impl Rasterizer + Send + Sync + 'static) -> Self {
        Self {
            rasterizer: Box::new(rasterizer),
            in_flight: Mutex::new(()),
        }
    }

    pub fn transform(
        &self,
        asset: &ImageAsset,
        settings: &TransformSettings,
    ) -> Result<EncodedResult> {
        let _guard = self.in_flight.lock();
        settings.validate()?;

        let (width, height) = resolve_dimensions(
            asset.width(),
            asset.height(),
            settings.target_width,
            settings.target_height,
            settings.maintain_aspect_ratio,
        );
        debug!(
            "transform {}x{} -> {}x{} rot={} flip=({}, {}) as {:?}",
            asset.width(),
            asset.height(),
            width,
            height,
            settings.rotation.degrees(),
            settings.flip_horizontal,
            settings.flip_vertical,
            settings.output_format
        );
        check_canvas_size(width, height, settings.output_format)?;

        // decoded and intermediate buffers are dropped before returning
        let canvas = {
            let source = asset.decode()?;
            self.rasterizer
                .rasterize(&source, &TransformPlan::new((width, height), settings))
        };
        let bytes = encode(&canvas, settings)?;

        Ok(EncodedResult {
            width,
            height,
            media_type: settings.output_format.media_type(),
            bytes,
        })
    }
}

fn encoder_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Png => "PNG",
        OutputFormat::Jpeg => "JPEG",
        OutputFormat::Webp => "WebP",
    }
}

/// Reject canvases above `image`'s default allocation budget before any
/// pixel buffer is allocated.
fn check_canvas_size(width: u32, height: u32, format: OutputFormat) -> Result<()> {
    let limit = image::Limits::default().max_alloc.unwrap_or(u64::MAX);
    let needed = (width as u64 * height as u64).saturating_mul(4);
    if needed > limit {
        return Err(Error::encode(
            encoder_name(format),
            format!(
                "{}x{} canvas needs {} bytes, limit is {}",
                width, height, needed, limit
            ),
        ));
    }
    Ok(())
}

fn encode(canvas: &RgbaImage, settings: &TransformSettings) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match settings.output_format {
        OutputFormat::Png => encode_png(canvas, settings.png_compression, &mut out)?,
        OutputFormat::Jpeg => encode_jpeg(canvas, settings.quality, &mut out)?,
        OutputFormat::Webp => encode_webp(canvas, settings.quality, &mut out)?,
    }
    Ok(out)
}

pub fn encode_png(canvas: &RgbaImage, compress: PngCompression, writer: impl Write) -> Result<()> {
    let (width, height) = canvas.dimensions();
    let writer = std::io::BufWriter::new(writer);
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    // - fast: fastest encoding, larger files (fdeflate + Paeth)
    // - small: smaller files, slower encoding (zlib + NoFilter)
    match compress {
        PngCompression::Fast => {
            encoder.set_compression(png::Compression::Fast);
            encoder.set_filter(png::Filter::Paeth);
        }
        PngCompression::Small => {
            encoder.set_compression(png::Compression::Balanced);
            encoder.set_filter(png::Filter::NoFilter);
        }
    }

    let mut writer = encoder
        .write_header()
        .map_err(|e| Error::encode("PNG", e))?;
    writer
        .write_image_data(canvas.as_raw())
        .map_err(|e| Error::encode("PNG", e))?;
    writer.finish().map_err(|e| Error::encode("PNG", e))?;
    Ok(())
}

/// map quality in (0, 1] onto the encoder's 1..=100 scale
pub fn quality_percent(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// transparent regions come out black, as a canvas JPEG export does
pub fn flatten_onto_black(canvas: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(canvas.as_raw().len() / 4 * 3);
    for px in canvas.as_raw().chunks_exact(4) {
        let alpha = px[3] as u16;
        for &c in &px[..3] {
            rgb.push(((c as u16 * alpha + 127) / 255) as u8);
        }
    }
    rgb
}

pub fn encode_jpeg(canvas: &RgbaImage, quality: f32, writer: impl Write) -> Result<()> {
    let (width, height) = canvas.dimensions();
    let rgb = flatten_onto_black(canvas);
    let mut writer = writer;
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality_percent(quality))
        .encode(&rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| Error::encode("JPEG", e))
}

/// Lossy WebP on top of the pure-Rust lossless encoder: RGB channels are
/// quantized to fewer levels first, which the lossless coder compresses
/// much better. Quality 1.0 skips quantization.
pub fn encode_webp(canvas: &RgbaImage, quality: f32, writer: impl Write) -> Result<()> {
    let (width, height) = canvas.dimensions();
    let percent = quality_percent(quality);
    let mut pixels = canvas.as_raw().clone();
    quantize_rgb(&mut pixels, percent);
    image::codecs::webp::WebPEncoder::new_lossless(writer)
        .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| Error::encode("WebP", e))
}

fn quantize_rgb(data: &mut [u8], quality: u8) {
    if quality >= 100 {
        return;
    }
    let step = 255.0 / (levels_for_quality(quality) as f32 - 1.0);
    for pixel in data.chunks_exact_mut(4) {
        for channel in pixel.iter_mut().take(3) {
            let bucket = (f32::from(*channel) / step).round();
            *channel = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// finer palettes at high quality, aggressively coarse at the low end
fn levels_for_quality(quality: u8) -> u16 {
    if quality >= 100 {
        return 256;
    }
    let normalized = (quality as f32).clamp(1.0, 100.0) / 100.0;
    let levels = 2.0 + normalized * normalized * 254.0;
    levels.round().clamp(2.0, 256.0) as u16
}
