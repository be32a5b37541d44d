//! The `Flow` data model: the unit of work filters operate on.
//!
//! A `Flow` bundles the upstream request, the upstream response, and a small
//! metadata bag filters use to pass state to one another. This is our own
//! type, not the host proxy's session type — the host proxy is expected to
//! build one of these per intercepted response and hand it to [`crate::pipeline::response`].

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Well-known metadata keys shared between filters.
pub const KEY_PROXYAUTH: &str = "proxyauth";
pub const KEY_MAPPED_URLS: &str = "mapped_urls";

/// The value types stored in a [`Flow`]'s metadata bag. Kept as a closed,
/// typed set per key rather than a catch-all `serde_json::Value` so filters
/// can pattern-match instead of re-deserializing.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    ProxyAuth { username: String, password: String },
    MappedUrls { public: Url, internal: Url },
}

#[derive(Debug, Clone, Default)]
pub struct Metadata(HashMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Metadata(HashMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.0.insert(key.into(), value);
    }

    /// Convenience accessor for the `proxyauth` key set by the host proxy
    /// after validating client Basic auth.
    pub fn proxyauth(&self) -> Option<(&str, &str)> {
        match self.0.get(KEY_PROXYAUTH) {
            Some(MetadataValue::ProxyAuth { username, password }) => {
                Some((username.as_str(), password.as_str()))
            }
            _ => None,
        }
    }

    pub fn set_proxyauth(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.insert(
            KEY_PROXYAUTH,
            MetadataValue::ProxyAuth {
                username: username.into(),
                password: password.into(),
            },
        );
    }

    /// Convenience accessor for the `mapped_urls` key set by the request-path
    /// host remap filter and consumed by its response-path counterpart.
    pub fn mapped_urls(&self) -> Option<(&Url, &Url)> {
        match self.0.get(KEY_MAPPED_URLS) {
            Some(MetadataValue::MappedUrls { public, internal }) => Some((public, internal)),
            _ => None,
        }
    }

    pub fn set_mapped_urls(&mut self, public: Url, internal: Url) {
        self.insert(KEY_MAPPED_URLS, MetadataValue::MappedUrls { public, internal });
    }
}

/// The unit of work passed through the filter pipeline.
#[derive(Debug, Clone)]
pub struct Flow {
    pub request: Request,
    pub response: Response,
    pub metadata: Metadata,
}

impl Flow {
    pub fn new(request: Request, response: Response) -> Self {
        Flow {
            request,
            response,
            metadata: Metadata::new(),
        }
    }

    /// Replaces the response wholesale, as the Kerberos retry action does
    /// once it has an authenticated reply from upstream.
    pub fn set_response(&mut self, response: Response) {
        self.response = response;
    }
}
