//! Pixel and millimetre geometry shared by both engines.

/// PDF user-space points per millimetre
pub const PT_PER_MM: f64 = 72.0 / 25.4;

pub fn mm_to_pt(mm: f64) -> f64 {
    mm * PT_PER_MM
}

/// Resolve the output canvas size for a resize request.
///
/// With `keep_aspect` and both targets given the result fits inside the
/// target box on one axis and may be smaller on the other; it never crops.
/// Fractional sizes round half-up and never drop below one pixel.
pub fn resolve_dimensions(
    src_w: u32,
    src_h: u32,
    target_w: Option<u32>,
    target_h: Option<u32>,
    keep_aspect: bool,
) -> (u32, u32) {
    if target_w.is_none() && target_h.is_none() {
        return (src_w, src_h);
    }
    if !keep_aspect {
        return (target_w.unwrap_or(src_w), target_h.unwrap_or(src_h));
    }

    let aspect = src_w as f64 / src_h as f64;
    let (w, h) = match (target_w, target_h) {
        (Some(w), Some(h)) => {
            let box_aspect = w as f64 / h as f64;
            if aspect > box_aspect {
                (w as f64, w as f64 / aspect)
            } else {
                (h as f64 * aspect, h as f64)
            }
        }
        (Some(w), None) => (w as f64, w as f64 / aspect),
        (None, Some(h)) => (h as f64 * aspect, h as f64),
        (None, None) => unreachable!(),
    };
    (to_pixels(w), to_pixels(h))
}

fn to_pixels(v: f64) -> u32 {
    (v.round() as u32).max(1)
}

/// axis-aligned rectangle in millimetres, origin at the page's top-left
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RectMm {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectMm {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}
