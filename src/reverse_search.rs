use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseSearchLinks {
    pub google: String,
    pub tineye: String,
}

/// Build reverse-image-search links for an absolute http(s) image URL.
/// No request is made; the links are for the user to open.
pub fn build_links(raw: &str) -> Result<ReverseSearchLinks> {
    let image_url = raw.trim();
    if !(image_url.starts_with("http://") || image_url.starts_with("https://")) {
        return Err(Error::InvalidImageUrl);
    }

    let encoded = urlencoding::encode(image_url);
    Ok(ReverseSearchLinks {
        google: format!(
            "https://www.google.com/searchbyimage?image_url={}&encoded_image=&image_content=&filename=&hl=en",
            encoded
        ),
        tineye: format!("https://www.tineye.com/search?url={}", encoded),
    })
}
