//! Upstream request and response bodies.

use serde::{Deserialize, Serialize};

/// Text-to-image request.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest<'a> {
    pub prompt: &'a str,
    pub width: u32,
    pub height: u32,
}

/// Image-to-video request.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRequest<'a> {
    pub image_url: &'a str,
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    /// Seconds, as a string ("5" or "10")
    pub duration: &'a str,
    pub mode: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MediaFile {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ImageResponse {
    #[serde(default)]
    pub images: Vec<MediaFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VideoResponse {
    #[serde(default)]
    pub video: Option<MediaFile>,
}

impl ImageResponse {
    pub(crate) fn first_url(self) -> Option<String> {
        self.images
            .into_iter()
            .next()
            .and_then(|f| f.url)
            .filter(|u| !u.trim().is_empty())
    }
}

impl VideoResponse {
    pub(crate) fn url(self) -> Option<String> {
        self.video
            .and_then(|f| f.url)
            .filter(|u| !u.trim().is_empty())
    }
}

/// Error body returned by the upstream on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_response_first_url() {
        let resp: ImageResponse =
            serde_json::from_str(r#"{"images":[{"url":"https://a/1.png"},{"url":"https://a/2.png"}]}"#)
                .unwrap();
        assert_eq!(resp.first_url().as_deref(), Some("https://a/1.png"));

        let empty: ImageResponse = serde_json::from_str(r#"{"images":[]}"#).unwrap();
        assert!(empty.first_url().is_none());

        let blank: ImageResponse = serde_json::from_str(r#"{"images":[{"url":""}]}"#).unwrap();
        assert!(blank.first_url().is_none());
    }

    #[test]
    fn test_video_response_url() {
        let resp: VideoResponse =
            serde_json::from_str(r#"{"video":{"url":"https://a/v.mp4"},"seed":1}"#).unwrap();
        assert_eq!(resp.url().as_deref(), Some("https://a/v.mp4"));

        let missing: VideoResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.url().is_none());
    }

    #[test]
    fn test_video_request_wire_shape() {
        let body = VideoRequest {
            image_url: "https://a/1.png",
            prompt: "p",
            negative_prompt: "n",
            duration: "5",
            mode: "std",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "image_url": "https://a/1.png",
                "prompt": "p",
                "negative_prompt": "n",
                "duration": "5",
                "mode": "std"
            })
        );
    }
}
