//! in-memory fixtures shared by unit tests

use std::io::Cursor;

use crate::asset::{ImageAsset, MediaType};

pub fn encode(img: &image::RgbaImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

/// opaque gradient PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 40) as u8, (y * 40) as u8, 90, 255])
    });
    encode(&img, image::ImageFormat::Png)
}

pub fn png_asset(width: u32, height: u32) -> ImageAsset {
    ImageAsset::from_bytes(0, png_bytes(width, height), MediaType::Png).unwrap()
}

pub fn asset_from(img: &image::RgbaImage) -> ImageAsset {
    ImageAsset::from_bytes(0, encode(img, image::ImageFormat::Png), MediaType::Png).unwrap()
}
