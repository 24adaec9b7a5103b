#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod asset;
mod batch;
mod convert;
mod error;
mod geometry;
mod layout;
mod merge;
mod parse;
mod raster;
mod settings;
#[cfg(test)]
mod test_support;
mod transform;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;

use batch::CancelToken;
use merge::DocumentInfo;
use parse::{EmbedFormat, Orientation, OutputFormat, PageSize, PngCompression};
use settings::{EmbedSettings, LayoutPatch, Preset, Rotation, TransformPatch};

#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Resize, rotate and re-encode images, or lay them out into a PDF"
)]
struct Cli {
    /// only report warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// report sizing and page-break decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// resize, rotate, flip and re-encode images
    Convert {
        /// input image files or dirs (png, jpg, webp, gif, bmp, tiff)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// output dir (default next to each input), or "-" for stdout (single image only)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// output format
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// quality for jpeg and webp, in (0, 1]
        #[arg(long)]
        quality: Option<f32>,

        /// target width in pixels
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        width: Option<u32>,

        /// target height in pixels
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        height: Option<u32>,

        /// fill both targets exactly instead of keeping the aspect ratio
        #[arg(long)]
        stretch: bool,

        /// clockwise rotation in degrees, a multiple of 90
        #[arg(long, allow_hyphen_values = true)]
        rotate: Option<i32>,

        /// mirror left to right
        #[arg(long)]
        flip_h: bool,

        /// mirror top to bottom
        #[arg(long)]
        flip_v: bool,

        /// PNG compression: fast (speed) or small (filesize)
        #[arg(short, long)]
        compress: Option<PngCompression>,

        /// JSON settings file applied before the flags above
        #[arg(long)]
        preset: Option<PathBuf>,

        /// write the effective settings to this JSON file
        #[arg(long)]
        save_preset: Option<PathBuf>,
    },
    /// lay images out into a single PDF
    Merge {
        /// input image files or dirs (png, jpg, webp, gif, bmp, tiff)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// output PDF path, "-" for stdout
        #[arg(short, long, default_value = "output.pdf")]
        output: PathBuf,

        /// page size
        #[arg(long)]
        pagesize: Option<PageSize>,

        #[arg(long)]
        orientation: Option<Orientation>,

        /// margin on every side, in mm
        #[arg(long)]
        margin: Option<f64>,

        /// maximum number of images on one page
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        per_page: Option<u32>,

        /// vertical space between stacked images, in mm
        #[arg(long)]
        gap: Option<f64>,

        /// place images at their natural size (see --dpi), shrinking only
        #[arg(long)]
        actual_size: bool,

        /// DPI of input images, used with --actual-size (72-2400)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(72..=2400))]
        dpi: Option<u32>,

        /// how images are stored in the PDF
        #[arg(long)]
        embed: Option<EmbedFormat>,

        /// JPEG quality for embedded images, in (0, 1]
        #[arg(long)]
        embed_quality: Option<f32>,

        /// PDF title metadata
        #[arg(long)]
        title: Option<String>,

        /// PDF author metadata
        #[arg(long)]
        author: Option<String>,

        /// fail on the first unreadable image instead of skipping it
        #[arg(long)]
        strict: bool,

        /// print the placement plan as JSON to stderr
        #[arg(long)]
        plan: bool,

        /// JSON settings file applied before the flags above
        #[arg(long)]
        preset: Option<PathBuf>,

        /// write the effective settings to this JSON file
        #[arg(long)]
        save_preset: Option<PathBuf>,
    },
    /// generate shell completions
    Completions {
        /// shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn init_logging(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialise logging")
}

fn load_preset(path: Option<&PathBuf>) -> Result<Preset> {
    match path {
        Some(path) => Preset::load(path),
        None => Ok(Preset::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose)?;

    let cancel = CancelToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || token.cancel()).context("Failed to set Ctrl+C handler")?;

    match cli.command {
        Commands::Convert {
            images,
            output,
            format,
            quality,
            width,
            height,
            stretch,
            rotate,
            flip_h,
            flip_v,
            compress,
            preset,
            save_preset,
        } => {
            let preset = load_preset(preset.as_ref())?;
            let flags = TransformPatch {
                format,
                quality,
                width: width.map(Some),
                height: height.map(Some),
                maintain_aspect_ratio: stretch.then_some(false),
                rotation: rotate.map(Rotation::try_from).transpose()?,
                flip_horizontal: flip_h.then_some(true),
                flip_vertical: flip_v.then_some(true),
                png_compression: compress,
            };
            let settings = preset.transform_settings().merged(&flags);
            settings.validate()?;

            if let Some(path) = save_preset {
                Preset {
                    transform: Some(TransformPatch::from(&settings)),
                    ..preset
                }
                .save(&path)?;
                log::info!("Saved preset to {}", path.display());
            }

            let images =
                parse::expand_image_paths(&images, |p| !convert::is_converted_output(p))?;
            anyhow::ensure!(!images.is_empty(), "No input images provided");
            convert::convert_images(&images, output.as_deref(), &settings, cancel)?;
        }
        Commands::Merge {
            images,
            output,
            pagesize,
            orientation,
            margin,
            per_page,
            gap,
            actual_size,
            dpi,
            embed,
            embed_quality,
            title,
            author,
            strict,
            plan,
            preset,
            save_preset,
        } => {
            let preset = load_preset(preset.as_ref())?;
            let layout = preset.layout_settings().merged(&LayoutPatch {
                page_size: pagesize,
                orientation,
                margin_mm: margin,
                images_per_page: per_page,
                fit_to_page: actual_size.then_some(false),
                gap_mm: gap,
                dpi,
            });
            let base_embed = preset.embed_settings();
            let embed = EmbedSettings {
                format: embed.unwrap_or(base_embed.format),
                quality: embed_quality.unwrap_or(base_embed.quality),
            };
            layout.validate()?;
            embed.validate()?;

            if let Some(path) = save_preset {
                Preset {
                    layout: Some(LayoutPatch::from(&layout)),
                    embed: Some(embed),
                    ..preset
                }
                .save(&path)?;
                log::info!("Saved preset to {}", path.display());
            }

            let images = parse::expand_image_paths(&images, |_| true)?;
            anyhow::ensure!(!images.is_empty(), "No input images provided");
            merge::merge_images(
                &images,
                &output,
                &merge::MergeOptions {
                    layout,
                    embed,
                    info: DocumentInfo {
                        title: title.as_deref(),
                        author: author.as_deref(),
                    },
                    strict,
                    print_plan: plan,
                },
                &cancel,
            )?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "folio",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
