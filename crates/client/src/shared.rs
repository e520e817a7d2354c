//! Process-wide cache instance.
//!
//! The first caller builds the cache from [`AppConfig`] with an
//! [`HttpTransport`]; every later caller gets the same handle. Concurrent
//! first calls wait for a single initialization.
//!
//! The shared cache runs its workers on the runtime that built it. That
//! runtime must outlive every use of the cache: once it shuts down, queued
//! and later operations resolve as [`Error::Closed`].

use std::sync::Arc;

use tokio::sync::OnceCell;
use urlvault_core::{AppConfig, ConfigError, Error, UrlCache};

use crate::fetch::{FetchConfig, HttpTransport};

static SHARED: OnceCell<UrlCache> = OnceCell::const_new();

/// Errors from building the shared cache.
#[derive(Debug, thiserror::Error)]
pub enum SharedCacheError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] Error),
}

/// Build a cache with the HTTP transport, independent of the shared one.
pub async fn build_cache(config: &AppConfig) -> Result<UrlCache, Error> {
    let transport = HttpTransport::new(FetchConfig::from(config))?;
    UrlCache::from_config(config, Arc::new(transport)).build().await
}

/// The process-wide cache, configured from the environment on first use.
///
/// The first call binds the cache to the current tokio runtime. Call it from
/// the runtime that lives for the whole process (typically the one started by
/// `#[tokio::main]`); if that runtime is dropped, operations on the shared
/// cache resolve as [`Error::Closed`].
pub async fn shared_cache() -> Result<&'static UrlCache, SharedCacheError> {
    SHARED
        .get_or_try_init(|| async {
            let config = AppConfig::load()?;
            Ok::<_, SharedCacheError>(build_cache(&config).await?)
        })
        .await
}

/// The process-wide cache, configured from `config` if this call is the
/// first. Later calls ignore `config`.
///
/// Binds to the calling runtime the same way as [`shared_cache`].
pub async fn shared_cache_with(config: &AppConfig) -> Result<&'static UrlCache, Error> {
    SHARED.get_or_try_init(|| build_cache(config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use urlvault_core::RetentionClass;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_build_cache_fetches_once_then_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("document"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { cache_dir: dir.path().to_path_buf(), ..Default::default() };
        let cache = build_cache(&config).await.unwrap();
        let url = format!("{}/doc", server.uri());

        let first = cache.load_url(&url, RetentionClass::Permanent, true).await.unwrap();
        let second = cache.load_url(&url, RetentionClass::Permanent, true).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(&second.bytes[..], b"document");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_cache_is_singleton() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { cache_dir: dir.path().to_path_buf(), ..Default::default() };

        let (a, b) = tokio::join!(shared_cache_with(&config), shared_cache_with(&config));
        let a = a.unwrap();
        let b = b.unwrap();
        assert!(std::ptr::eq(a, b));
    }
}
