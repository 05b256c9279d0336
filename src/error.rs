//! Error taxonomy for the fact-check pipeline.
//!
//! Every variant is recoverable: the window returns to an idle state and the
//! user can fix the input and try again.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Image larger than the upload ceiling.
    #[error("Image file is too large ({size} bytes). Please use an image smaller than {}MB.", .limit / (1024 * 1024))]
    OversizeAsset { size: u64, limit: u64 },

    #[error("Unsupported file type ({0}). Please upload a JPEG, PNG image, or a TXT document.")]
    UnsupportedMediaType(String),

    /// Video was selected; only still frames can be analyzed.
    #[error("Video files cannot be automatically analyzed by this tool. Please manually extract a keyframe (image) and upload the image instead.")]
    UnsupportedMediaGuidance,

    #[error("Could not read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither a staged image nor a long enough claim.
    #[error("Please enter a claim (min 10 characters) OR upload an image.")]
    ValidationFailed,

    #[error("An error occurred during the API request: {0}")]
    Delivery(String),

    #[error("AI analysis failed to return a valid response: {0}")]
    MalformedResponse(String),

    #[error("Please enter a valid image URL starting with http:// or https://")]
    InvalidImageUrl,
}

impl Error {
    /// Errors raised while staging a file; the selection must be reset.
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            Error::OversizeAsset { .. }
                | Error::UnsupportedMediaType(_)
                | Error::UnsupportedMediaGuidance
                | Error::FileRead { .. }
        )
    }
}
