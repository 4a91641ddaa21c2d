//! Secret source backed by an HTTP endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};

use super::{SecretEntry, SecretSource, parse_entries};
use crate::credentials::AccessToken;
use crate::error::FetchError;

/// Fetches `GET {base_url}/projects/{scope}/secrets` with a bearer token
pub struct HttpSource {
    http: HttpClient,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .user_agent(concat!("credcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn secrets_url(&self, scope: &str) -> String {
        format!("{}/projects/{}/secrets", self.base_url, scope)
    }
}

#[async_trait]
impl SecretSource for HttpSource {
    async fn fetch(
        &self,
        scope: &str,
        credential: &AccessToken,
        timeout: Duration,
    ) -> Result<Vec<SecretEntry>, FetchError> {
        let url = self.secrets_url(scope);
        log::debug!("GET {}", url);

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::from(e)
            }
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(credential.expose())
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(map_err)?;
                parse_entries(&body)
            }
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthenticated),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(FetchError::Unauthorized),
            status => Err(FetchError::Unreachable(format!(
                "Unexpected status code: {}",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccessToken {
        AccessToken::new("test-token")
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/projects/proj-1/secrets")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"[{"key": "A", "value": "1"}, {"key": "B", "value": "2"}]"#)
            .create_async()
            .await;

        let source = HttpSource::new(server.url()).unwrap();
        let entries = source
            .fetch("proj-1", &token(), Duration::from_secs(5))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            entries,
            vec![SecretEntry::new("A", "1"), SecretEntry::new("B", "2")]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_status_maps_to_unauthenticated() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects/proj-1/secrets")
            .with_status(401)
            .create_async()
            .await;

        let source = HttpSource::new(server.url()).unwrap();
        let err = source
            .fetch("proj-1", &token(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Unauthenticated);
    }

    #[tokio::test]
    async fn test_not_found_maps_to_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects/missing/secrets")
            .with_status(404)
            .create_async()
            .await;

        let source = HttpSource::new(server.url()).unwrap();
        let err = source
            .fetch("missing", &token(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Unauthorized);
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects/proj-1/secrets")
            .with_status(503)
            .create_async()
            .await;

        let source = HttpSource::new(server.url()).unwrap();
        let err = source
            .fetch("proj-1", &token(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects/proj-1/secrets")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        let source = HttpSource::new(server.url()).unwrap();
        let err = source
            .fetch("proj-1", &token(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Port 9 (discard) is essentially never listening on test hosts
        let source = HttpSource::new("http://127.0.0.1:9").unwrap();
        let err = source
            .fetch("proj-1", &token(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Unreachable(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let source = HttpSource::new("http://localhost:8080/api/").unwrap();
        assert_eq!(
            source.secrets_url("p"),
            "http://localhost:8080/api/projects/p/secrets"
        );
    }
}
