mod common;

use common::*;
use std::path::Path;

fn run_convert(input: &Path, extra: &[&str]) {
    let output = folio("convert")
        .arg(input)
        .args(extra)
        .arg("--quiet")
        .output()
        .expect("failed to run folio");
    assert_success(&output, "convert");
}

#[test]
fn test_resize_width_keeps_aspect() {
    let dir = tmp_dir("convert_width");
    let img = dir.join("photo.png");
    write_png_rgb(&img, 40, 20);
    run_convert(&img, &["--width", "10"]);

    let out = image::open(dir.join("photo_converted.png")).unwrap();
    assert_eq!((out.width(), out.height()), (10, 5));
}

#[test]
fn test_box_fit_and_stretch() {
    let dir = tmp_dir("convert_box");
    let img = dir.join("wide.png");
    write_png_rgb(&img, 40, 20);

    run_convert(&img, &["--width", "16", "--height", "16"]);
    let out = image::open(dir.join("wide_converted.png")).unwrap();
    assert_eq!((out.width(), out.height()), (16, 8));

    run_convert(&img, &["--width", "16", "--height", "16", "--stretch"]);
    let out = image::open(dir.join("wide_converted.png")).unwrap();
    assert_eq!((out.width(), out.height()), (16, 16));
}

#[test]
fn test_jpeg_and_webp_outputs() {
    let dir = tmp_dir("convert_lossy");
    let img = dir.join("pic.png");
    write_png_rgb(&img, 12, 9);

    run_convert(&img, &["-f", "jpeg", "--quality", "0.8"]);
    let jpg = dir.join("pic_converted.jpg");
    assert_eq!(image::ImageFormat::from_path(&jpg).unwrap(), image::ImageFormat::Jpeg);
    let out = image::open(&jpg).unwrap();
    assert_eq!((out.width(), out.height()), (12, 9));

    run_convert(&img, &["-f", "webp", "--quality", "0.5"]);
    let out = image::open(dir.join("pic_converted.webp")).unwrap();
    assert_eq!((out.width(), out.height()), (12, 9));
}

#[test]
fn test_zero_quality_only_matters_for_lossy_formats() {
    let dir = tmp_dir("convert_quality");
    let img = dir.join("q.png");
    write_png_rgb(&img, 4, 4);

    run_convert(&img, &["-f", "png", "--quality", "0"]);
    assert!(dir.join("q_converted.png").exists());

    let output = folio("convert")
        .arg(&img)
        .args(["-f", "jpeg", "--quality", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!dir.join("q_converted.jpg").exists());
}

#[test]
fn test_quarter_turn_keeps_canvas() {
    let dir = tmp_dir("convert_rotate");
    let img = dir.join("r.png");
    write_png_rgb(&img, 30, 10);
    run_convert(&img, &["--rotate", "-90", "--flip-h"]);

    let out = image::open(dir.join("r_converted.png")).unwrap().to_rgba8();
    assert_eq!(out.dimensions(), (30, 10));
    // content is 10 wide after the turn, so the far corners stay empty
    assert_eq!(out.get_pixel(0, 0)[3], 0);
    assert_eq!(out.get_pixel(29, 9)[3], 0);
    assert_eq!(out.get_pixel(15, 5)[3], 255);
}

#[test]
fn test_rotation_must_be_quarter_turns() {
    let dir = tmp_dir("convert_bad_rotate");
    let img = dir.join("r.png");
    write_png_rgb(&img, 4, 4);
    let output = folio("convert").arg(&img).args(["--rotate", "45"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_failed_item_does_not_stop_batch() {
    let dir = tmp_dir("convert_batch");
    let a = dir.join("a.png");
    let bad = dir.join("b.png");
    let c = dir.join("c.jpg");
    write_png_rgb(&a, 5, 5);
    std::fs::write(&bad, b"garbage").unwrap();
    write_jpeg_rgb(&c, 6, 3);
    let out_dir = dir.join("out");

    let output = folio("convert")
        .args([&a, &bad, &c])
        .arg("-o")
        .arg(&out_dir)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 total error"));
    assert!(out_dir.join("a_converted.png").exists());
    assert!(!out_dir.join("b_converted.png").exists());
    let c_out = image::open(out_dir.join("c_converted.png")).unwrap();
    assert_eq!((c_out.width(), c_out.height()), (6, 3));
}

#[test]
fn test_convert_to_stdout() {
    let dir = tmp_dir("convert_stdout");
    let img = dir.join("s.png");
    write_png_rgb(&img, 7, 3);

    let output = folio("convert")
        .arg(&img)
        .args(["-o", "-", "-f", "jpg", "--quiet"])
        .output()
        .unwrap();
    assert_success(&output, "convert");
    let out =
        image::load_from_memory_with_format(&output.stdout, image::ImageFormat::Jpeg).unwrap();
    assert_eq!((out.width(), out.height()), (7, 3));

    // stdout takes a single image only
    let second = dir.join("t.png");
    write_png_rgb(&second, 2, 2);
    let output = folio("convert").args([&img, &second]).args(["-o", "-"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_transform_preset() {
    let dir = tmp_dir("convert_preset");
    let img = dir.join("p.png");
    write_png_rgb(&img, 20, 20);
    let preset = dir.join("preset.json");
    std::fs::write(
        &preset,
        r#"{"transform": {"format": "jpeg", "width": 8, "quality": 0.7}}"#,
    )
    .unwrap();
    let saved = dir.join("saved.json");

    run_convert(
        &img,
        &[
            "--preset",
            preset.to_str().unwrap(),
            "--height",
            "4",
            "--save-preset",
            saved.to_str().unwrap(),
        ],
    );

    // box 8x4 on a square source
    let out = image::open(dir.join("p_converted.jpg")).unwrap();
    assert_eq!((out.width(), out.height()), (4, 4));

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&saved).unwrap()).unwrap();
    assert_eq!(saved["transform"]["format"].as_str().unwrap(), "jpeg");
    assert_eq!(saved["transform"]["width"].as_u64().unwrap(), 8);
    assert_eq!(saved["transform"]["height"].as_u64().unwrap(), 4);
}

#[test]
fn test_same_stem_inputs_keep_both_outputs() {
    let dir = tmp_dir("convert_same_stem");
    let a = dir.join("a");
    let b = dir.join("b");
    std::fs::create_dir_all(&a).unwrap();
    std::fs::create_dir_all(&b).unwrap();
    write_png_rgb(&a.join("cat.png"), 10, 10);
    write_jpeg_rgb(&b.join("cat.jpg"), 20, 20);
    let out_dir = dir.join("out");

    let output = folio("convert")
        .args([a.join("cat.png"), b.join("cat.jpg")])
        .arg("-o")
        .arg(&out_dir)
        .arg("--quiet")
        .output()
        .unwrap();
    assert_success(&output, "convert");

    let first = image::open(out_dir.join("cat_converted.png")).unwrap();
    let second = image::open(out_dir.join("cat_converted_1.png")).unwrap();
    assert_eq!((first.width(), first.height()), (10, 10));
    assert_eq!((second.width(), second.height()), (20, 20));
}

#[test]
fn test_rerun_over_directory_skips_outputs() {
    let dir = tmp_dir("convert_rerun");
    write_png_rgb(&dir.join("cat.png"), 6, 6);

    for _ in 0..2 {
        let output = folio("convert").arg(&dir).arg("--quiet").output().unwrap();
        assert_success(&output, "convert");
    }

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["cat.png", "cat_converted.png"]);
}

#[test]
fn test_oversized_target_fails_cleanly() {
    let dir = tmp_dir("convert_oversized");
    let img = dir.join("big.png");
    write_png_rgb(&img, 4, 4);

    let output = folio("convert")
        .arg(&img)
        .args(["--width", "100000", "--height", "100000", "--stretch"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("canvas needs"));
    assert!(!dir.join("big_converted.png").exists());
}
