use thiserror::Error;

/// Failures surfaced by the scoring pipeline.
///
/// `ImageDecode` never escapes a batch: the aggregator records it on the
/// image's response. The other variants abort the invocation.
#[derive(Debug, Error)]
pub enum OmrError {
    #[error("{0}")]
    ClientInput(String),

    #[error("{0}")]
    ImageDecode(String),

    #[error("failed to build report: {0}")]
    Encoding(String),
}

impl OmrError {
    /// HTTP status the handler answers with for an invocation-level failure.
    pub fn status_code(&self) -> u16 {
        match self {
            OmrError::ClientInput(_) => 400,
            OmrError::ImageDecode(_) | OmrError::Encoding(_) => 500,
        }
    }
}

impl From<image::ImageError> for OmrError {
    fn from(err: image::ImageError) -> Self {
        OmrError::ImageDecode(err.to_string())
    }
}

impl From<base64::DecodeError> for OmrError {
    fn from(err: base64::DecodeError) -> Self {
        OmrError::ImageDecode(format!("invalid base64: {err}"))
    }
}

impl From<rust_xlsxwriter::XlsxError> for OmrError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        OmrError::Encoding(err.to_string())
    }
}

pub type OmrResult<T> = std::result::Result<T, OmrError>;
