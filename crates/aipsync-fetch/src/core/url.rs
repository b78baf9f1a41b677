use crate::{Error, Result};

/// Resolve a part link against the publication root.
///
/// Absolute `http(s)` links are returned untouched; relative links are
/// appended to the root, keeping exactly one `/` between the two.
///
/// # Examples
///
/// ```
/// use aipsync_fetch::resolve_url;
///
/// let url = resolve_url("https://aip.example/20240118/eAIP/", "pdf/RJTT.pdf").unwrap();
/// assert_eq!(url, "https://aip.example/20240118/eAIP/pdf/RJTT.pdf");
/// ```
pub fn resolve_url(root: &str, link: &str) -> Result<String> {
    let link = link.trim();
    if link.is_empty() {
        return Err(Error::InvalidUrl(format!("empty link under {root}")));
    }
    if is_absolute(link) {
        return Ok(link.to_string());
    }
    let root = root.trim();
    if !is_absolute(root) {
        return Err(Error::InvalidUrl(root.to_string()));
    }
    Ok(format!(
        "{}/{}",
        root.trim_end_matches('/'),
        link.trim_start_matches('/')
    ))
}

fn is_absolute(url: &str) -> bool { url.starts_with("http://") || url.starts_with("https://") }
