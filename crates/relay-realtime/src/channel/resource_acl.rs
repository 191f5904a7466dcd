//! HTTP resource-ACL client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use relay_core::config::ResourceAclConfig;
use relay_core::error::{AppError, ErrorKind};
use relay_core::result::AppResult;
use relay_core::traits::resource_access::ResourceAccessCheck;
use relay_core::types::id::IdentityId;

/// Response body of the access endpoint.
#[derive(Debug, Deserialize)]
struct AccessResponse {
    allowed: bool,
}

/// Asks the application backend whether an identity may observe a resource.
///
/// Sends `GET {url}/{type}/{id}/access?identity=<id>` and expects
/// `{"allowed": bool}`.
#[derive(Debug, Clone)]
pub struct HttpResourceAccess {
    /// Shared HTTP client with the configured timeout.
    client: reqwest::Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Gateway API key.
    api_key: String,
}

impl HttpResourceAccess {
    /// Creates a client from configuration. Requires `url` to be set.
    pub fn new(config: &ResourceAclConfig) -> Result<Self, AppError> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| AppError::configuration("channels.resource_acl.url is not set"))?
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn access_url(
        &self,
        resource_type: &str,
        resource_id: &str,
        identity_id: &IdentityId,
    ) -> AppResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AppError::configuration(format!("Invalid resource ACL URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| AppError::configuration("Resource ACL URL cannot carry a path"))?
            .pop_if_empty()
            .extend([resource_type, resource_id, "access"]);
        url.query_pairs_mut()
            .append_pair("identity", identity_id.as_str());
        Ok(url)
    }
}

fn backend_error(message: String) -> AppError {
    AppError::new(ErrorKind::AuthBackend, "RESOURCE_ACL_UNAVAILABLE", message)
}

#[async_trait]
impl ResourceAccessCheck for HttpResourceAccess {
    async fn check(
        &self,
        resource_type: &str,
        resource_id: &str,
        identity_id: &IdentityId,
    ) -> AppResult<bool> {
        let url = self.access_url(resource_type, resource_id, identity_id)?;

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if !self.api_key.is_empty() {
            request = request.header("X-Api-Key", &self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Resource ACL request failed");
            backend_error(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(backend_error(format!(
                "resource ACL answered status {}",
                status.as_u16()
            )));
        }

        let body: AccessResponse = response
            .json()
            .await
            .map_err(|e| backend_error(format!("unrecognized resource ACL body: {e}")))?;
        Ok(body.allowed)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> HttpResourceAccess {
        HttpResourceAccess::new(&ResourceAclConfig {
            url: Some(format!("{}/acl/", server.uri())),
            api_key: "gateway-key".into(),
            timeout_ms: 1_000,
            ..ResourceAclConfig::default()
        })
        .expect("client")
    }

    #[tokio::test]
    async fn test_allowed_flag_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acl/resource/42/access"))
            .and(query_param("identity", "7"))
            .and(header("x-api-key", "gateway-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "allowed": true })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let allowed = client(&server)
            .check("resource", "42", &IdentityId::from(7u64))
            .await
            .expect("answered");
        assert!(allowed);
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .check("resource", "42", &IdentityId::from(7u64))
            .await
            .expect_err("5xx");
        assert_eq!(err.code, "RESOURCE_ACL_UNAVAILABLE");
    }

    #[test]
    fn test_resource_id_is_one_encoded_segment() {
        let acl = HttpResourceAccess::new(&ResourceAclConfig {
            url: Some("http://acl.test/acl/".into()),
            ..ResourceAclConfig::default()
        })
        .expect("client");
        let identity = IdentityId::from(7u64);

        let url = acl
            .access_url("resource", "a/b", &identity)
            .expect("url");
        assert_eq!(url.as_str(), "http://acl.test/acl/resource/a%2Fb/access?identity=7");

        let url = acl
            .access_url("resource", "v1.2", &identity)
            .expect("url");
        assert_eq!(url.path(), "/acl/resource/v1.2/access");
    }

    #[test]
    fn test_missing_url_is_configuration_error() {
        assert!(HttpResourceAccess::new(&ResourceAclConfig::default()).is_err());
    }
}
