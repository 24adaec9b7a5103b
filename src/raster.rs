//! Drawing surface for the transform pipeline.
//!
//! The pipeline only needs "draw this source, scaled to the canvas, under a
//! rotation and flip about the canvas centre". That capability is the
//! [`Rasterizer`] trait; [`SoftwareRasterizer`] is the CPU implementation.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};

use crate::settings::{Rotation, TransformSettings};

/// everything needed to draw one source onto the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformPlan {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl TransformPlan {
    pub fn new(canvas: (u32, u32), settings: &TransformSettings) -> Self {
        Self {
            canvas_width: canvas.0,
            canvas_height: canvas.1,
            rotation: settings.rotation,
            flip_horizontal: settings.flip_horizontal,
            flip_vertical: settings.flip_vertical,
        }
    }

    fn is_axis_identity(&self) -> bool {
        self.rotation == Rotation::None && !self.flip_horizontal && !self.flip_vertical
    }
}

pub trait Rasterizer {
    /// Draw `source` onto a fresh transparent canvas of the plan's size.
    ///
    /// The source is scaled to exactly the canvas size, then rotated
    /// clockwise and flipped about the canvas centre. The canvas never
    /// reshapes to fit the rotated content.
    fn rasterize(&self, source: &DynamicImage, plan: &TransformPlan) -> RgbaImage;
}

#[derive(Debug, Clone, Copy)]
pub struct SoftwareRasterizer {
    filter: FilterType,
}

impl Default for SoftwareRasterizer {
    fn default() -> Self {
        Self {
            filter: FilterType::CatmullRom,
        }
    }
}

impl Rasterizer for SoftwareRasterizer {
    fn rasterize(&self, source: &DynamicImage, plan: &TransformPlan) -> RgbaImage {
        let (w, h) = (plan.canvas_width, plan.canvas_height);
        let scaled = if source.width() == w && source.height() == h {
            source.to_rgba8()
        } else {
            image::imageops::resize(&source.to_rgba8(), w, h, self.filter)
        };
        if plan.is_axis_identity() {
            return scaled;
        }

        let (cos, sin) = plan.rotation.cos_sin();
        let sx = if plan.flip_horizontal { -1.0 } else { 1.0 };
        let sy = if plan.flip_vertical { -1.0 } else { 1.0 };
        let (half_w, half_h) = (w as f64 / 2.0, h as f64 / 2.0);

        // canvas = T * R * S * local, so local = S * R^T * (canvas - centre)
        RgbaImage::from_fn(w, h, |px, py| {
            let qx = px as f64 + 0.5 - half_w;
            let qy = py as f64 + 0.5 - half_h;
            let lx = sx * (cos * qx + sin * qy) + half_w;
            let ly = sy * (-sin * qx + cos * qy) + half_h;
            if lx < 0.0 || ly < 0.0 || lx >= w as f64 || ly >= h as f64 {
                return Rgba([0, 0, 0, 0]);
            }
            *scaled.get_pixel(lx.floor() as u32, ly.floor() as u32)
        })
    }
}
