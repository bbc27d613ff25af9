use crate::backoff::ExponentialBackoff;
use crate::config::NodeConfig;
use crate::error::{ObsidianError, Result};
use crate::search::LoadResponse;
use crate::track::{RawTrack, TrackInfo};
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// REST client for a node's HTTP API
///
/// Every request carries the node password in the `Authorization` header.
/// Non-2xx responses are retried with exponential backoff until the attempt
/// budget runs out, then surface as [`ObsidianError::Http`] with the last
/// response attached.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    password: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpClient {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        Self::with_base_url(config, config.http_url())
    }

    /// Client pointed at an explicit base URL instead of the configured host
    pub fn with_base_url(config: &NodeConfig, base_url: impl Into<String>) -> Result<Self> {
        if config.http_max_retries < 1 {
            return Err(ObsidianError::InvalidConfig(
                "http_max_retries must be at least 1".to_string(),
            ));
        }

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client: Client::builder().build()?,
            base_url,
            password: config.password.clone(),
            max_retries: config.http_max_retries,
            backoff_base: config.http_backoff_base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request and parse the JSON body of the first 2xx response
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        route: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, route.trim_start_matches('/'));
        let mut backoff = ExponentialBackoff::new(self.backoff_base);
        let mut last = (0u16, String::new());

        for attempt in 1..=self.max_retries {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(header::AUTHORIZATION, &self.password)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }

            last = (status.as_u16(), response.text().await.unwrap_or_default());

            if attempt < self.max_retries {
                let delay = backoff.next_delay();
                tracing::warn!(
                    "HTTP | {} status code while requesting from {}, retrying in {:.2} seconds",
                    status.as_u16(),
                    url,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(
            "HTTP | {} status code while requesting from {}, retry limit exhausted",
            last.0,
            url
        );
        Err(ObsidianError::Http {
            status: last.0,
            url,
            body: last.1,
        })
    }

    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResponse> {
        self.request(Method::GET, "/loadtracks", &[("identifier", identifier)], None)
            .await
    }

    pub async fn decode_track(&self, track: &str) -> Result<TrackInfo> {
        self.request(Method::GET, "/decodetrack", &[("track", track)], None)
            .await
    }

    pub async fn decode_tracks(&self, tracks: &[String]) -> Result<Vec<RawTrack>> {
        let body = json!({ "tracks": tracks });
        self.request(Method::POST, "/decodetracks", &[], Some(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer, retries: u32) -> HttpClient {
        let config = NodeConfig::default()
            .with_password("secret")
            .with_http_retries(retries, Duration::from_millis(1));
        HttpClient::with_base_url(&config, server.uri()).unwrap()
    }

    #[tokio::test]
    async fn succeeds_on_last_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/loadtracks"))
            .respond_with(ResponseTemplate::new(500).set_body_string("busy"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/loadtracks"))
            .and(query_param("identifier", "ytsearch:song"))
            .and(header("Authorization", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "load_type": "NO_MATCHES",
                "tracks": []
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let response = client.load_tracks("ytsearch:song").await.unwrap();
        assert!(response.tracks.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/decodetrack"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let err = client.decode_track("abc").await.unwrap_err();
        match err {
            ObsidianError::Http { status, url, body } => {
                assert_eq!(status, 503);
                assert!(url.ends_with("/decodetrack"));
                assert_eq!(body, "unavailable");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn decode_tracks_posts_ids() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/decodetracks"))
            .and(body_json(json!({"tracks": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, 1);
        let tracks = client
            .decode_tracks(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn zero_retries_is_rejected() {
        let config = NodeConfig::default().with_http_retries(0, Duration::from_millis(1));
        assert!(matches!(
            HttpClient::new(&config),
            Err(ObsidianError::InvalidConfig(_))
        ));
    }
}
