//! HTTP registry client.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::RegistrySource;
use crate::constants::{MAX_LISTING_PAGES, REGISTRY_REQUEST_TIMEOUT};
use crate::core::{CompkitError, Result};
use crate::models::{ComponentManifest, ComponentPage, ComponentSummary, ComponentVersions};
use crate::version::{latest_version, sort_versions};

/// Client for the registry HTTP contract.
///
/// Non-2xx responses map onto the error taxonomy:
///
/// | Status | Error |
/// |---|---|
/// | 404 | `NotFound` |
/// | 429 | `RateLimited` (with the `Retry-After` hint when present) |
/// | 408, 5xx | `Unreachable` |
/// | any other | `InvalidManifest` |
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpRegistryClient {
    /// Create a client for the registry at `base_url`.
    ///
    /// # Errors
    ///
    /// Fails when `base_url` is not an absolute URL that can carry a path, or when the
    /// underlying HTTP client cannot be built (TLS backend unavailable).
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| CompkitError::Other {
                message: format!("Invalid registry URL: {base_url}"),
            })?;
        let client = reqwest::Client::builder()
            .timeout(REGISTRY_REQUEST_TIMEOUT)
            .user_agent(concat!("compkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CompkitError::Other {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url,
            client,
        })
    }

    /// Append `segments` to the base path. Each segment is percent-encoded, so a scoped
    /// name like `@acme/card` stays a single segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `url` and decode the JSON body. `name`/`version` label `NotFound` and
    /// `InvalidManifest` errors.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        name: &str,
        version: Option<&str>,
    ) -> Result<T> {
        debug!("GET {url}");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            CompkitError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &response, url.as_str(), name, version));
        }

        let body = response.bytes().await.map_err(|e| CompkitError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&body).map_err(|e| CompkitError::InvalidManifest {
            name: name.to_string(),
            reason: format!("malformed response from {url}: {e}"),
        })
    }

    async fn component_versions(&self, name: &str) -> Result<ComponentVersions> {
        self.get_json(self.url(&["components", name]), name, None).await
    }
}

fn status_error(
    status: StatusCode,
    response: &reqwest::Response,
    url: &str,
    name: &str,
    version: Option<&str>,
) -> CompkitError {
    match status {
        StatusCode::NOT_FOUND => CompkitError::NotFound {
            name: name.to_string(),
            version: version.map(str::to_string),
        },
        StatusCode::TOO_MANY_REQUESTS => CompkitError::RateLimited {
            url: url.to_string(),
            retry_after: response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        StatusCode::REQUEST_TIMEOUT => CompkitError::Unreachable {
            url: url.to_string(),
            reason: "request timed out".to_string(),
        },
        s if s.is_server_error() => CompkitError::Unreachable {
            url: url.to_string(),
            reason: format!("server error {s}"),
        },
        s => CompkitError::InvalidManifest {
            name: name.to_string(),
            reason: format!("registry rejected the request with {s}"),
        },
    }
}

#[async_trait]
impl RegistrySource for HttpRegistryClient {
    async fn fetch_manifest(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<ComponentManifest> {
        let version = match version {
            Some(v) => v.to_string(),
            None => {
                let info = self.component_versions(name).await?;
                latest_version(&info.versions)
                    .map(str::to_string)
                    .or(info.latest)
                    .ok_or_else(|| CompkitError::NotFound {
                        name: name.to_string(),
                        version: None,
                    })?
            }
        };

        let url = self.url(&["components", name, "versions", &version]);
        let manifest: ComponentManifest = self.get_json(url, name, Some(&version)).await?;
        manifest.validate(name, Some(&version))?;
        Ok(manifest)
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        let mut versions = self.component_versions(name).await?.versions;
        sort_versions(&mut versions);
        Ok(versions)
    }

    async fn list_components(&self) -> Result<Vec<ComponentSummary>> {
        let mut items = Vec::new();
        let mut page = 1;
        for _ in 0..MAX_LISTING_PAGES {
            let mut url = self.url(&["components"]);
            url.query_pairs_mut().append_pair("page", &page.to_string());
            let listing: ComponentPage = self.get_json(url, "components", None).await?;
            items.extend(listing.items);
            match listing.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items.dedup_by(|a, b| a.name == b.name);
        Ok(items)
    }

    fn location(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn manifest_json(name: &str, version: &str) -> serde_json::Value {
        json!({
            "name": name,
            "version": version,
            "files": [{"path": format!("ui/{name}.tsx"), "content": "export {}", "kind": "component"}],
            "dependencies": {"components": [], "packages": {}}
        })
    }

    #[tokio::test]
    async fn test_fetch_latest_uses_semver_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components/button");
                then.status(200).json_body(json!({
                    "name": "button",
                    "latest": "1.2.0",
                    "versions": ["1.2.0", "1.10.0", "1.9.0"]
                }));
            })
            .await;
        let manifest_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/components/button/versions/1.10.0");
                then.status(200).json_body(manifest_json("button", "1.10.0"));
            })
            .await;

        let client = HttpRegistryClient::new(&server.base_url()).unwrap();
        let manifest = client.fetch_manifest("button", None).await.unwrap();
        assert_eq!(manifest.version, "1.10.0");
        manifest_mock.assert_async().await;

        let versions = client.list_versions("button").await.unwrap();
        assert_eq!(versions, vec!["1.2.0", "1.9.0", "1.10.0"]);
    }

    #[tokio::test]
    async fn test_status_codes_map_to_error_kinds() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components/missing/versions/1.0.0");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components/busy/versions/1.0.0");
                then.status(429).header("Retry-After", "7");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components/broken/versions/1.0.0");
                then.status(503);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components/garbled/versions/1.0.0");
                then.status(200).body("{not json");
            })
            .await;

        let client = HttpRegistryClient::new(&server.base_url()).unwrap();

        let err = client.fetch_manifest("missing", Some("1.0.0")).await.unwrap_err();
        assert_eq!(
            err,
            CompkitError::NotFound {
                name: "missing".into(),
                version: Some("1.0.0".into())
            }
        );

        let err = client.fetch_manifest("busy", Some("1.0.0")).await.unwrap_err();
        assert!(matches!(
            err,
            CompkitError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(7)
        ));

        let err = client.fetch_manifest("broken", Some("1.0.0")).await.unwrap_err();
        assert!(matches!(err, CompkitError::Unreachable { .. }));

        let err = client.fetch_manifest("garbled", Some("1.0.0")).await.unwrap_err();
        assert!(matches!(err, CompkitError::InvalidManifest { .. }));
    }

    #[tokio::test]
    async fn test_manifest_for_wrong_component_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components/card/versions/2.0.0");
                then.status(200).json_body(manifest_json("button", "2.0.0"));
            })
            .await;

        let client = HttpRegistryClient::new(&server.base_url()).unwrap();
        let err = client.fetch_manifest("card", Some("2.0.0")).await.unwrap_err();
        assert!(matches!(err, CompkitError::InvalidManifest { .. }));
    }

    #[tokio::test]
    async fn test_list_components_follows_pages() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components").query_param("page", "1");
                then.status(200).json_body(json!({
                    "items": [{"name": "dialog", "latest": "0.4.0"}],
                    "nextPage": 2
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/components").query_param("page", "2");
                then.status(200).json_body(json!({
                    "items": [{"name": "button", "latest": "1.0.0"}]
                }));
            })
            .await;

        let client = HttpRegistryClient::new(&server.base_url()).unwrap();
        let names: Vec<String> =
            client.list_components().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["button", "dialog"]);
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let client = HttpRegistryClient::new("https://registry.example.com/api/").unwrap();
        assert_eq!(
            client.url(&["components", "button"]).as_str(),
            "https://registry.example.com/api/components/button"
        );
        assert_eq!(
            client.url(&["components", "@acme/card", "versions", "1.0.0+build 1"]).as_str(),
            "https://registry.example.com/api/components/@acme%2Fcard/versions/1.0.0+build%201"
        );
        assert_eq!(client.location(), "https://registry.example.com/api");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(HttpRegistryClient::new("not a url").is_err());
        assert!(HttpRegistryClient::new("mailto:registry@example.com").is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let client = HttpRegistryClient::new("http://127.0.0.1:9").unwrap();
        let err = client.fetch_manifest("button", Some("1.0.0")).await.unwrap_err();
        assert!(err.is_retriable());
    }
}
