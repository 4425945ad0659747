//! Pages the agent may not be injected into.

use markcopy_core::{Error, Result};

/// Browser-internal, extension and source-view schemes.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "chrome-search://",
    "chrome-untrusted://",
    "edge://",
    "brave://",
    "opera://",
    "vivaldi://",
    "about:",
    "view-source:",
    "devtools://",
    "moz-extension://",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
    "https://microsoftedge.microsoft.com/addons",
];

/// Whether delivery to `url` is refused. Blank URLs count as restricted:
/// nothing can be injected into a tab without a document.
pub fn is_restricted_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return true;
    }
    let lower = url.to_ascii_lowercase();
    RESTRICTED_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// `Err(RestrictedPage)` for restricted URLs.
pub fn check_url(url: &str) -> Result<()> {
    if is_restricted_url(url) {
        return Err(Error::RestrictedPage(url.to_string()));
    }
    Ok(())
}
