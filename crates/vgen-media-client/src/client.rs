//! fal.ai HTTP client.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, warn, Instrument};
use vgen_models::VideoDuration;

use crate::error::{MediaError, MediaResult};
use crate::types::{ErrorBody, ImageRequest, ImageResponse, VideoRequest, VideoResponse};

const DEFAULT_IMAGE_URL: &str = "https://fal.run/fal-ai/flux/dev";
const DEFAULT_VIDEO_URL: &str = "https://fal.run/fal-ai/kling-video/v1.6/standard/image-to-video";

/// Longest slice of an upstream error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// The two upstream operations the job runner depends on.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    /// Generate a still image and return its URL.
    async fn synthesize_image(&self, prompt: &str, width: u32, height: u32) -> MediaResult<String>;

    /// Animate `image_url` and return the video URL.
    async fn synthesize_video(
        &self,
        image_url: &str,
        prompt: &str,
        negative_prompt: &str,
        duration: VideoDuration,
    ) -> MediaResult<String>;
}

/// Configuration for the fal.ai client.
#[derive(Clone)]
pub struct MediaClientConfig {
    /// API key sent in the authorization header
    pub api_key: String,
    /// Authorization scheme placed before the key
    pub auth_scheme: String,
    /// Text-to-image endpoint
    pub image_url: String,
    /// Image-to-video endpoint
    pub video_url: String,
    /// Timeout for image synthesis
    pub image_timeout: Duration,
    /// Timeout for video synthesis
    pub video_timeout: Duration,
    /// Video model quality mode
    pub video_mode: String,
}

impl fmt::Debug for MediaClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaClientConfig")
            .field("api_key", &"<redacted>")
            .field("auth_scheme", &self.auth_scheme)
            .field("image_url", &self.image_url)
            .field("video_url", &self.video_url)
            .field("image_timeout", &self.image_timeout)
            .field("video_timeout", &self.video_timeout)
            .field("video_mode", &self.video_mode)
            .finish()
    }
}

impl MediaClientConfig {
    /// Config with default endpoints and timeouts for the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            auth_scheme: "Bearer".to_string(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
            video_url: DEFAULT_VIDEO_URL.to_string(),
            image_timeout: Duration::from_secs(60),
            video_timeout: Duration::from_secs(600),
            video_mode: "std".to_string(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> MediaResult<Self> {
        let api_key = std::env::var("FAL_KEY")
            .map_err(|_| MediaError::Config("FAL_KEY must be set".to_string()))?;

        let defaults = Self::new(api_key);
        let config = Self {
            auth_scheme: std::env::var("FAL_AUTH_SCHEME").unwrap_or(defaults.auth_scheme.clone()),
            image_url: std::env::var("FAL_IMAGE_URL").unwrap_or(defaults.image_url.clone()),
            video_url: std::env::var("FAL_VIDEO_URL").unwrap_or(defaults.video_url.clone()),
            image_timeout: Duration::from_secs(
                std::env::var("FAL_IMAGE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            video_timeout: Duration::from_secs(
                std::env::var("FAL_VIDEO_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            video_mode: std::env::var("FAL_VIDEO_MODE").unwrap_or(defaults.video_mode.clone()),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the client cannot work with.
    pub fn validate(&self) -> MediaResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(MediaError::Config("FAL_KEY cannot be empty".to_string()));
        }
        if self.image_timeout.is_zero() {
            return Err(MediaError::Config("image timeout must be positive".to_string()));
        }
        if self.video_timeout <= self.image_timeout {
            return Err(MediaError::Config(format!(
                "video timeout ({}s) must be larger than image timeout ({}s)",
                self.video_timeout.as_secs(),
                self.image_timeout.as_secs()
            )));
        }
        Ok(())
    }

    fn authorization(&self) -> String {
        format!("{} {}", self.auth_scheme, self.api_key)
    }
}

/// fal.ai client. Requests are sent once; retry policy belongs to callers.
pub struct FalClient {
    image_http: Client,
    video_http: Client,
    config: MediaClientConfig,
}

impl FalClient {
    pub fn new(config: MediaClientConfig) -> MediaResult<Self> {
        config.validate()?;

        let image_http = Client::builder()
            .timeout(config.image_timeout)
            .build()
            .map_err(MediaError::Network)?;
        let video_http = Client::builder()
            .timeout(config.video_timeout)
            .build()
            .map_err(MediaError::Network)?;

        Ok(Self {
            image_http,
            video_http,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> MediaResult<Self> {
        Self::new(MediaClientConfig::from_env()?)
    }

    pub fn config(&self) -> &MediaClientConfig {
        &self.config
    }

    async fn post<B, R>(
        &self,
        operation: &'static str,
        http: &Client,
        url: &str,
        timeout: Duration,
        body: &B,
    ) -> MediaResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let span = info_span!("media_request", operation = operation);

        async {
            let start = Instant::now();
            let result = http
                .post(url)
                .header(reqwest::header::AUTHORIZATION, self.config.authorization())
                .json(body)
                .send()
                .await;

            histogram!("vgen_upstream_latency_seconds", "operation" => operation)
                .record(start.elapsed().as_secs_f64());

            let response = result.map_err(|e| transport_error(e, timeout))?;
            let status = response.status();
            debug!(status = status.as_u16(), "Upstream responded");

            if !status.is_success() {
                return Err(failure_from_response(response).await);
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| transport_error(e, timeout))?;
            Ok(serde_json::from_slice(&bytes)?)
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl MediaGenerator for FalClient {
    async fn synthesize_image(&self, prompt: &str, width: u32, height: u32) -> MediaResult<String> {
        let body = ImageRequest {
            prompt,
            width,
            height,
        };
        let response: ImageResponse = self
            .post(
                "synthesize_image",
                &self.image_http,
                &self.config.image_url,
                self.config.image_timeout,
                &body,
            )
            .await?;

        response.first_url().ok_or(MediaError::MissingResult("image"))
    }

    async fn synthesize_video(
        &self,
        image_url: &str,
        prompt: &str,
        negative_prompt: &str,
        duration: VideoDuration,
    ) -> MediaResult<String> {
        let body = VideoRequest {
            image_url,
            prompt,
            negative_prompt,
            duration: duration.as_str(),
            mode: &self.config.video_mode,
        };
        let response: VideoResponse = self
            .post(
                "synthesize_video",
                &self.video_http,
                &self.config.video_url,
                self.config.video_timeout,
                &body,
            )
            .await?;

        response.url().ok_or(MediaError::MissingResult("video"))
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> MediaError {
    if e.is_timeout() {
        warn!(timeout_secs = timeout.as_secs(), "Upstream request timed out");
        MediaError::Timeout(timeout.as_secs())
    } else {
        MediaError::Network(e)
    }
}

async fn failure_from_response(response: Response) -> MediaError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail)
        .map(|detail| match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or(body);

    MediaError::RequestFailed {
        status,
        message: truncate(&message, ERROR_BODY_LIMIT),
    }
}

fn truncate(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> MediaClientConfig {
        MediaClientConfig {
            image_url: format!("{}/image", server.uri()),
            video_url: format!("{}/video", server.uri()),
            ..MediaClientConfig::new("test-key")
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = MediaClientConfig::new("k");
        assert_eq!(config.image_timeout, Duration::from_secs(60));
        assert_eq!(config.video_timeout, Duration::from_secs(600));
        assert_eq!(config.auth_scheme, "Bearer");
        assert_eq!(config.video_mode, "std");
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_video_timeout_must_exceed_image_timeout() {
        let config = MediaClientConfig {
            video_timeout: Duration::from_secs(60),
            ..MediaClientConfig::new("k")
        };
        assert!(matches!(config.validate(), Err(MediaError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = MediaClientConfig::new("super-secret");
        assert!(!format!("{:?}", config).contains("super-secret"));
    }

    #[test]
    #[serial]
    fn test_from_env_requires_key() {
        std::env::remove_var("FAL_KEY");
        assert!(matches!(MediaClientConfig::from_env(), Err(MediaError::Config(_))));

        std::env::set_var("FAL_KEY", "abc");
        std::env::set_var("FAL_AUTH_SCHEME", "Key");
        let config = MediaClientConfig::from_env().unwrap();
        assert_eq!(config.authorization(), "Key abc");
        std::env::remove_var("FAL_KEY");
        std::env::remove_var("FAL_AUTH_SCHEME");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[tokio::test]
    async fn test_synthesize_image_returns_first_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "prompt": "a fire spirit",
                "width": 768,
                "height": 1344
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "images": [{"url": "https://cdn/img.png", "width": 768}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FalClient::new(config_for(&server)).unwrap();
        let url = client.synthesize_image("a fire spirit", 768, 1344).await.unwrap();
        assert_eq!(url, "https://cdn/img.png");
    }

    #[tokio::test]
    async fn test_synthesize_image_without_url_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"images": []})))
            .mount(&server)
            .await;

        let client = FalClient::new(config_for(&server)).unwrap();
        let err = client.synthesize_image("p", 1, 1).await.unwrap_err();
        assert!(matches!(err, MediaError::MissingResult("image")));
    }

    #[tokio::test]
    async fn test_non_success_status_uses_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(serde_json::json!({"detail": "prompt rejected"})),
            )
            .mount(&server)
            .await;

        let client = FalClient::new(config_for(&server)).unwrap();
        match client.synthesize_image("p", 1, 1).await.unwrap_err() {
            MediaError::RequestFailed { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "prompt rejected");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_synthesize_video_sends_image_and_duration() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/video"))
            .and(body_json(serde_json::json!({
                "image_url": "https://cdn/img.png",
                "prompt": "slow push in",
                "negative_prompt": "blur",
                "duration": "10",
                "mode": "std"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "video": {"url": "https://cdn/out.mp4"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FalClient::new(config_for(&server)).unwrap();
        let url = client
            .synthesize_video("https://cdn/img.png", "slow push in", "blur", VideoDuration::Ten)
            .await
            .unwrap();
        assert_eq!(url, "https://cdn/out.mp4");
    }

    #[tokio::test]
    async fn test_synthesize_video_without_url_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"video": {}})))
            .mount(&server)
            .await;

        let client = FalClient::new(config_for(&server)).unwrap();
        let err = client
            .synthesize_video("https://cdn/img.png", "p", "n", VideoDuration::Five)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingResult("video")));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(1500))
                    .set_body_json(serde_json::json!({"images": [{"url": "https://cdn/i.png"}]})),
            )
            .mount(&server)
            .await;

        let config = MediaClientConfig {
            image_timeout: Duration::from_millis(200),
            video_timeout: Duration::from_secs(5),
            ..config_for(&server)
        };
        let client = FalClient::new(config).unwrap();
        let err = client.synthesize_image("p", 1, 1).await.unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)), "got {err:?}");
    }
}
