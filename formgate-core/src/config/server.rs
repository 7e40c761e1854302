use std::net::SocketAddr;
use url::Url;

/// HTTP surface settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// First path segment of every API route: `/{namespace}/v1/...`.
    pub namespace: String,
    /// Default redirect destination; also defines the trusted origin.
    pub home_url: Url,
    /// Extra origins that payment redirects may point to.
    pub allowed_redirect_origins: Vec<String>,
}
