//! Configuration module

mod site;

pub use site::AuthConfig;
pub use site::CacheConfig;
pub use site::GitHubConfig;
pub use site::HighlightConfig;
pub use site::OAuthCredentials;
pub use site::ServerConfig;
pub use site::SiteConfig;
