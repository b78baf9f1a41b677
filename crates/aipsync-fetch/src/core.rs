//! Pure transformations for fetching.

mod retry;
mod url;

pub use retry::retry_delay;
pub use url::resolve_url;
