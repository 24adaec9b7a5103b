use thiserror::Error;

/// failures raised by the transform and layout engines
#[derive(Debug, Error)]
pub enum Error {
    /// input bytes could not be decoded as the declared media type
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// encoder rejected the pixel buffer or parameters
    #[error("failed to encode {format}: {reason}")]
    Encode { format: &'static str, reason: String },

    #[error("no images to lay out")]
    EmptyInput,

    #[error("margin {margin_mm}mm leaves no content on a {page_width_mm}x{page_height_mm}mm page")]
    InvalidMargin {
        margin_mm: f64,
        page_width_mm: f64,
        page_height_mm: f64,
    },

    /// dimensions of an asset could not be determined
    #[error("failed to load image #{index}: {reason}")]
    AssetLoad { index: usize, reason: String },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn encode(format: &'static str, reason: impl ToString) -> Self {
        Error::Encode {
            format,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidSettings(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
