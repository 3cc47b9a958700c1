mod https;
pub mod response;

pub use https::HttpsProbe;

use async_trait::async_trait;
use std::time::Duration;

pub struct ProbeRequest<'a> {
    pub address: &'a str,
    pub virtual_host: &'a str,
    pub search_text: &'a str,
    pub timeout: Duration,
}

/// A single check of one address. Every failure is reported as `false`.
#[async_trait]
pub trait Prober: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, req: &ProbeRequest<'_>) -> bool;
}

pub fn body_matches(body: &[u8], search_text: &str) -> bool {
    if search_text.is_empty() {
        return true;
    }
    let needle = search_text.as_bytes();
    body.windows(needle.len()).any(|window| window == needle)
}
