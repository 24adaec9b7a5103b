//! Page layout: where every image lands in the output document.
//!
//! Packing is first-fit in input order with no backtracking. Each image is
//! sized to the content width, capped to its even share of the content
//! height, centred horizontally and stacked top-down.

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::geometry::RectMm;
use crate::settings::PageLayoutSettings;

/// one image's page and rectangle (mm, page top-left origin)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlacement {
    /// position of the image in the input sequence
    pub index: usize,
    /// 0-based
    pub page: usize,
    #[serde(flatten)]
    pub rect: RectMm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub page_count: usize,
    pub placements: Vec<PagePlacement>,
}

impl LayoutPlan {
    pub fn placements_on(&self, page: usize) -> impl Iterator<Item = &PagePlacement> {
        self.placements.iter().filter(move |p| p.page == page)
    }
}

/// Area left after removing `margin_mm` from all four sides.
pub fn content_box(settings: &PageLayoutSettings) -> Result<RectMm> {
    let (page_w, page_h) = settings.page_dimensions_mm();
    let margin = settings.margin_mm;
    if !margin.is_finite() || margin < 0.0 || margin * 2.0 >= page_w || margin * 2.0 >= page_h {
        return Err(Error::InvalidMargin {
            margin_mm: margin,
            page_width_mm: page_w,
            page_height_mm: page_h,
        });
    }
    Ok(RectMm {
        x: margin,
        y: margin,
        width: page_w - margin * 2.0,
        height: page_h - margin * 2.0,
    })
}

/// Place images with the given pixel dimensions, in order.
pub fn plan_layout(dimensions: &[(u32, u32)], settings: &PageLayoutSettings) -> Result<LayoutPlan> {
    settings.validate()?;
    if dimensions.is_empty() {
        return Err(Error::EmptyInput);
    }
    let content = content_box(settings)?;
    let (page_w, page_h) = settings.page_dimensions_mm();
    let margin = settings.margin_mm;
    let per_page = settings.images_per_page as usize;
    let slot_height = content.height / settings.images_per_page as f64;

    let mut placements = Vec::with_capacity(dimensions.len());
    let mut page = 0;
    let mut on_page = 0;
    let mut cursor_y = margin;

    for (index, &(px_w, px_h)) in dimensions.iter().enumerate() {
        if px_w == 0 || px_h == 0 {
            return Err(Error::AssetLoad {
                index,
                reason: format!("image has zero area ({}x{})", px_w, px_h),
            });
        }
        let aspect = px_w as f64 / px_h as f64;

        let mut width = content.width;
        if !settings.fit_to_page {
            width = width.min(px_w as f64 * 25.4 / settings.dpi as f64);
        }
        let mut height = width / aspect;
        if height > slot_height {
            height = slot_height;
            width = height * aspect;
        }

        // an empty page always takes the image, however tall
        if on_page >= per_page || (cursor_y + height > page_h - margin && on_page > 0) {
            page += 1;
            on_page = 0;
            cursor_y = margin;
        }

        let rect = RectMm {
            x: margin + (content.width - width) / 2.0,
            y: cursor_y,
            width,
            height,
        };
        debug!(
            "image {} -> page {} at ({:.2}, {:.2}) size {:.2}x{:.2}mm",
            index, page, rect.x, rect.y, rect.width, rect.height
        );
        cursor_y = rect.bottom() + settings.gap_mm;
        placements.push(PagePlacement { index, page, rect });

        on_page += 1;
    }

    Ok(LayoutPlan {
        page_width_mm: page_w,
        page_height_mm: page_h,
        page_count: page + 1,
        placements,
    })
}
