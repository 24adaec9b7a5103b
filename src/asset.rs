use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// accepted input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
    Tiff,
}

impl MediaType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "gif" => Some(MediaType::Gif),
            "webp" => Some(MediaType::Webp),
            "bmp" => Some(MediaType::Bmp),
            "tif" | "tiff" => Some(MediaType::Tiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
            MediaType::Bmp => "image/bmp",
            MediaType::Tiff => "image/tiff",
        }
    }

    fn decoder_format(self) -> image::ImageFormat {
        match self {
            MediaType::Jpeg => image::ImageFormat::Jpeg,
            MediaType::Png => image::ImageFormat::Png,
            MediaType::Gif => image::ImageFormat::Gif,
            MediaType::Webp => image::ImageFormat::WebP,
            MediaType::Bmp => image::ImageFormat::Bmp,
            MediaType::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// immutable handle to an input image: header dimensions plus the raw bytes
#[derive(Debug, Clone)]
pub struct ImageAsset {
    width: u32,
    height: u32,
    media_type: MediaType,
    bytes: Arc<[u8]>,
}

impl ImageAsset {
    /// read dimensions from the header of `bytes`; `index` identifies the
    /// asset in error reports
    pub fn from_bytes(index: usize, bytes: Vec<u8>, media_type: MediaType) -> Result<Self> {
        let reader =
            image::ImageReader::with_format(Cursor::new(&bytes[..]), media_type.decoder_format());
        let (width, height) = reader.into_dimensions().map_err(|e| Error::AssetLoad {
            index,
            reason: e.to_string(),
        })?;
        if width == 0 || height == 0 {
            return Err(Error::AssetLoad {
                index,
                reason: format!("image has zero area ({}x{})", width, height),
            });
        }
        Ok(Self {
            width,
            height,
            media_type,
            bytes: bytes.into(),
        })
    }

    /// read a file whose media type is declared by its extension
    pub fn load(index: usize, path: &Path) -> Result<Self> {
        let media_type = MediaType::from_path(path).ok_or_else(|| Error::AssetLoad {
            index,
            reason: format!("unsupported file type: {}", path.display()),
        })?;
        let bytes = std::fs::read(path)?;
        Self::from_bytes(index, bytes, media_type)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// full decode using the declared media type's decoder only
    pub fn decode(&self) -> Result<image::DynamicImage> {
        image::load_from_memory_with_format(&self.bytes, self.media_type.decoder_format())
            .map_err(Error::Decode)
    }
}
