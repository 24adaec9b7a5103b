use anyhow::Context;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::asset::ImageAsset;
use crate::batch::CancelToken;
use crate::error::{Error, Result};
use crate::geometry::mm_to_pt;
use crate::layout::{plan_layout, LayoutPlan};
use crate::parse::EmbedFormat;
use crate::settings::{EmbedSettings, PageLayoutSettings};
use crate::transform::encode_jpeg;

/// optional document metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentInfo<'a> {
    pub title: Option<&'a str>,
    pub author: Option<&'a str>,
}

/// placement plan plus the finished PDF
#[derive(Debug)]
pub struct LayoutOutput {
    pub plan: LayoutPlan,
    pub document: Vec<u8>,
}

/// image data converted for embedding
enum PreparedImage {
    Jpeg {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    /// pixel data compressed with deflate
    Compressed {
        width: u32,
        height: u32,
        color_channels: u8,
        color_compressed: Vec<u8>,
        alpha_compressed: Option<Vec<u8>>,
    },
}

/// Lay out `assets` in order and render them into a PDF.
pub fn layout(
    assets: &[ImageAsset],
    settings: &PageLayoutSettings,
    embed: &EmbedSettings,
    info: DocumentInfo<'_>,
    cancel: &CancelToken,
) -> Result<LayoutOutput> {
    embed.validate()?;
    let dimensions: Vec<(u32, u32)> = assets.iter().map(ImageAsset::dimensions).collect();
    let plan = plan_layout(&dimensions, settings)?;
    let document = render_document(assets, &plan, embed, info, cancel)?;
    Ok(LayoutOutput { plan, document })
}

/// Explicit conversion of one asset into an embeddable image. The decoded
/// buffer is released before this returns.
fn prepare_image(asset: &ImageAsset, embed: &EmbedSettings) -> Result<PreparedImage> {
    let img = asset.decode()?;
    let (width, height) = (img.width(), img.height());

    match embed.format {
        EmbedFormat::Jpeg => {
            let mut data = Vec::new();
            encode_jpeg(&img.into_rgba8(), embed.quality, &mut data)?;
            Ok(PreparedImage::Jpeg {
                width,
                height,
                data,
            })
        }
        EmbedFormat::Lossless if img.color().has_alpha() => {
            let rgba = img.into_rgba8();
            let pixel_count = (width as usize) * (height as usize);

            let mut color_enc = ZlibEncoder::new(
                Vec::with_capacity(pixel_count * 3 / 2),
                Compression::fast(),
            );
            let mut alpha_enc = ZlibEncoder::new(
                Vec::with_capacity(pixel_count / 2),
                Compression::fast(),
            );
            for chunk in rgba.as_raw().chunks_exact(4) {
                color_enc.write_all(&chunk[..3])?;
                alpha_enc.write_all(&chunk[3..4])?;
            }

            Ok(PreparedImage::Compressed {
                width,
                height,
                color_channels: 3,
                color_compressed: color_enc.finish()?,
                alpha_compressed: Some(alpha_enc.finish()?),
            })
        }
        EmbedFormat::Lossless => {
            let (color_channels, pixels) = if img.color().channel_count() == 1 {
                (1, img.into_luma8().into_raw())
            } else {
                (3, img.into_rgb8().into_raw())
            };
            let mut enc = ZlibEncoder::new(
                Vec::with_capacity(pixels.len() / 2),
                Compression::fast(),
            );
            enc.write_all(&pixels)?;

            Ok(PreparedImage::Compressed {
                width,
                height,
                color_channels,
                color_compressed: enc.finish()?,
                alpha_compressed: None,
            })
        }
    }
}

fn image_xobject(
    width: u32,
    height: u32,
    color_space: &[u8],
    filter: &[u8],
    data: Vec<u8>,
) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => Object::Name(color_space.to_vec()),
            "BitsPerComponent" => 8,
            "Filter" => Object::Name(filter.to_vec()),
            "Length" => data.len() as i64,
        },
        data,
    )
}

fn add_image(doc: &mut Document, img: PreparedImage) -> ObjectId {
    match img {
        PreparedImage::Jpeg {
            width,
            height,
            data,
        } => doc.add_object(image_xobject(width, height, b"DeviceRGB", b"DCTDecode", data)),
        PreparedImage::Compressed {
            width,
            height,
            color_channels,
            color_compressed,
            alpha_compressed,
        } => {
            let color_space: &[u8] = if color_channels == 1 {
                b"DeviceGray"
            } else {
                b"DeviceRGB"
            };
            let mut stream =
                image_xobject(width, height, color_space, b"FlateDecode", color_compressed);
            if let Some(alpha_data) = alpha_compressed {
                let smask_id = doc.add_object(image_xobject(
                    width,
                    height,
                    b"DeviceGray",
                    b"FlateDecode",
                    alpha_data,
                ));
                stream.dict.set("SMask", smask_id);
            }
            doc.add_object(stream)
        }
    }
}

/// Write every placement of `plan` into a new PDF, one page per plan page.
/// `cancel` is checked before each image is decoded and re-encoded.
pub fn render_document(
    assets: &[ImageAsset],
    plan: &LayoutPlan,
    embed: &EmbedSettings,
    info: DocumentInfo<'_>,
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    let page_w_pts = mm_to_pt(plan.page_width_mm) as f32;
    let page_h_pts = mm_to_pt(plan.page_height_mm) as f32;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids: Vec<Object> = Vec::with_capacity(plan.page_count);

    for page in 0..plan.page_count {
        let mut operations = Vec::new();
        let mut xobjects = lopdf::Dictionary::new();

        for (slot, placement) in plan.placements_on(page).enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let asset = assets.get(placement.index).ok_or_else(|| Error::AssetLoad {
                index: placement.index,
                reason: "placement refers to a missing image".to_string(),
            })?;
            let image_id = add_image(&mut doc, prepare_image(asset, embed)?);
            let name = format!("Im{}", slot);
            xobjects.set(name.as_bytes().to_vec(), image_id);

            let r = placement.rect;
            // PDF origin is bottom-left
            let x = mm_to_pt(r.x) as f32;
            let y = mm_to_pt(plan.page_height_mm - r.y - r.height) as f32;
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(mm_to_pt(r.width) as f32),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(mm_to_pt(r.height) as f32),
                        Object::Real(x),
                        Object::Real(y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                Operation::new("Q", vec![]),
            ]);
            debug!("embedded image {} on page {}", placement.index, page);
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(|e| Error::encode("PDF", e))?,
        ));
        let resources_id = doc.add_object(dictionary! {
            "XObject" => xobjects,
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(page_w_pts),
                Object::Real(page_h_pts),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        page_ids.push(page_id.into());
    }

    // build pages tree
    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => page_ids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(Object::Dictionary(info_dictionary(info)));
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| Error::encode("PDF", e))?;
    Ok(out)
}

/// command-level options for [`merge_images`]
pub struct MergeOptions<'a> {
    pub layout: PageLayoutSettings,
    pub embed: EmbedSettings,
    pub info: DocumentInfo<'a>,
    /// abort on the first unreadable image instead of skipping it
    pub strict: bool,
    pub print_plan: bool,
}

/// Load `images`, lay them out and write the PDF to `output` ("-" for stdout).
pub fn merge_images(
    images: &[PathBuf],
    output: &Path,
    opts: &MergeOptions<'_>,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    info!("Merging {} image(s) -> {}", images.len(), output.display());
    let start = std::time::Instant::now();

    let mut assets = Vec::with_capacity(images.len());
    for (i, path) in images.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        match ImageAsset::load(i, path) {
            Ok(asset) => {
                info!(
                    "  [{}/{}] {} ({}x{} {}, {} bytes)",
                    i + 1,
                    images.len(),
                    path.display(),
                    asset.width(),
                    asset.height(),
                    asset.media_type().mime(),
                    asset.byte_len()
                );
                assets.push(asset);
            }
            Err(e) if opts.strict => {
                return Err(anyhow::Error::from(e)
                    .context(format!("Failed to load {}", path.display())));
            }
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    anyhow::ensure!(!assets.is_empty(), "None of the {} input images could be read", images.len());

    let out = layout(&assets, &opts.layout, &opts.embed, opts.info, cancel)?;
    if opts.print_plan {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&out.plan).context("Failed to serialize layout plan")?
        );
    }

    // write output
    let to_stdout = output == Path::new("-");
    if to_stdout {
        let stdout = std::io::stdout();
        let mut out_lock = std::io::BufWriter::new(stdout.lock());
        out_lock
            .write_all(&out.document)
            .and_then(|_| out_lock.flush())
            .context("Failed to write PDF to stdout")?;
    } else {
        std::fs::write(output, &out.document)
            .with_context(|| format!("Failed to save {}", output.display()))?;
    }

    info!(
        "Done. {} page(s) saved in {:.2}s",
        out.plan.page_count,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn literal(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), lopdf::StringFormat::Literal)
}

fn info_dictionary(info: DocumentInfo<'_>) -> lopdf::Dictionary {
    let mut dict = lopdf::Dictionary::new();
    dict.set(
        "Producer",
        literal(&format!("folio {}", env!("CARGO_PKG_VERSION"))),
    );
    // PDF date format: D:YYYYMMDDHHmmSSZ
    let now = chrono::Utc::now();
    dict.set(
        "CreationDate",
        literal(&now.format("D:%Y%m%d%H%M%SZ").to_string()),
    );
    if let Some(t) = info.title {
        dict.set("Title", literal(t));
    }
    if let Some(a) = info.author {
        dict.set("Author", literal(a));
    }
    dict
}
