use crate::asset::UploadedAsset;
use crate::error::{Error, Result};

/// A claim must be longer than this (after trimming) to stand on its own.
pub const MIN_CLAIM_CHARS: usize = 10;

pub fn can_submit(claim: &str, asset: &UploadedAsset) -> bool {
    asset.is_present() || claim.trim().chars().count() > MIN_CLAIM_CHARS
}

pub fn validate(claim: &str, asset: &UploadedAsset) -> Result<()> {
    if can_submit(claim, asset) {
        Ok(())
    } else {
        Err(Error::ValidationFailed)
    }
}
