//! Transport collaborator seam.
//!
//! The cache never talks to the network itself; it hands a [`FetchRequest`]
//! to a [`Transport`] and gets bytes or an error back.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::key::{normalize_parsed, normalize_url};

/// Request descriptor forwarded opaquely to the transport.
///
/// Only `url` takes part in cache keying; headers and timeout are passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    /// Build a plain request for an already-parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` for non-http(s) or host-less URLs.
    pub fn new(url: Url) -> Result<Self, Error> {
        Ok(Self { url: normalize_parsed(url)?, headers: Vec::new(), timeout: None })
    }

    /// Parse and normalize `url`.
    pub fn parse(url: &str) -> Result<Self, Error> {
        Ok(Self { url: normalize_url(url)?, headers: Vec::new(), timeout: None })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Fetches the bytes behind a request.
///
/// Implementations are expected to bound every call with a timeout and to
/// report it as [`Error::FetchTimeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes, Error>;
}
