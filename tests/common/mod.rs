#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn folio_bin() -> PathBuf {
    // cargo test builds the binary in the target directory
    let mut path = std::env::current_exe().unwrap();
    // tests/merge-<hash> -> deps dir -> debug dir
    path.pop();
    path.pop();
    path.push("folio");
    path
}

pub fn tmp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("folio_test_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn folio(subcommand: &str) -> Command {
    let mut cmd = Command::new(folio_bin());
    cmd.arg(subcommand);
    cmd
}

pub fn assert_success(output: &Output, what: &str) {
    if !output.status.success() {
        panic!(
            "folio {} failed:\nstdout: {}\nstderr: {}",
            what,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

pub fn write_png_rgb(path: &Path, w: u32, h: u32) {
    let img = image::RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 7) as u8, 200])
    });
    img.save(path).unwrap();
}

pub fn write_jpeg_rgb(path: &Path, w: u32, h: u32) {
    let img = image::RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 7) as u8, 128])
    });
    img.save(path).unwrap();
}

pub fn write_png_gray(path: &Path) {
    let img = image::GrayImage::from_fn(4, 4, |x, _y| image::Luma([(x * 60) as u8]));
    img.save(path).unwrap();
}

pub fn write_png_rgba(path: &Path) {
    let img = image::RgbaImage::from_fn(4, 4, |x, y| {
        image::Rgba([(x * 60) as u8, (y * 60) as u8, 100, 200])
    });
    img.save(path).unwrap();
}

/// write a tiny palette PNG using the png crate directly
pub fn write_png_palette(path: &Path) {
    use std::io::BufWriter;

    let file = std::fs::File::create(path).unwrap();
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, 4, 4);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    // red, green, blue, white
    encoder.set_palette(vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]);
    let mut writer = encoder.write_header().unwrap();
    let data: Vec<u8> = vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3];
    writer.write_image_data(&data).unwrap();
}
