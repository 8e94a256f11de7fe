//! Caller-supplied request parameters for video generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Maximum free-form prompt length.
pub const MAX_PROMPT_LENGTH: usize = 2000;

/// Errors raised when request parameters are unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Either an attribute or a prompt is required")]
    MissingInput,

    #[error("Unsupported duration {0}s (allowed: 5 or 10)")]
    InvalidDuration(u32),

    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// Clip length accepted by the image-to-video model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum VideoDuration {
    #[default]
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "10")]
    Ten,
}

impl VideoDuration {
    /// Parse a duration in seconds.
    pub fn from_secs(secs: u32) -> Option<Self> {
        match secs {
            5 => Some(VideoDuration::Five),
            10 => Some(VideoDuration::Ten),
            _ => None,
        }
    }

    pub fn as_secs(&self) -> u32 {
        match self {
            VideoDuration::Five => 5,
            VideoDuration::Ten => 10,
        }
    }

    /// Wire form expected by the upstream model ("5" / "10").
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoDuration::Five => "5",
            VideoDuration::Ten => "10",
        }
    }
}

/// Request parameters captured on the job record at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    /// Attribute tag driving the prompt builder (e.g. "Fire")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 64))]
    pub attribute: Option<String>,

    /// Free-form prompt text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub prompt: Option<String>,

    /// Clip duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl GenerateVideoRequest {
    /// Request driven by an attribute tag only.
    pub fn with_attribute(attribute: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            ..Default::default()
        }
    }

    /// Request driven by a free-form prompt only.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn duration_secs(mut self, secs: u32) -> Self {
        self.duration = Some(secs);
        self
    }

    /// Check the request before any side effect is attempted.
    pub fn validate_request(&self) -> Result<(), RequestError> {
        self.validate()
            .map_err(|e| RequestError::Invalid(e.to_string()))?;

        if self.attribute_tag().is_none() && self.custom_prompt().is_none() {
            return Err(RequestError::MissingInput);
        }

        if let Some(secs) = self.duration {
            if VideoDuration::from_secs(secs).is_none() {
                return Err(RequestError::InvalidDuration(secs));
            }
        }

        Ok(())
    }

    /// Trimmed attribute tag, if non-blank.
    pub fn attribute_tag(&self) -> Option<&str> {
        non_blank(self.attribute.as_deref())
    }

    /// Trimmed free-form prompt, if non-blank.
    pub fn custom_prompt(&self) -> Option<&str> {
        non_blank(self.prompt.as_deref())
    }

    /// Requested duration, falling back to the default for absent values.
    pub fn video_duration(&self) -> VideoDuration {
        self.duration
            .and_then(VideoDuration::from_secs)
            .unwrap_or_default()
    }

    /// Text stored in the job's `prompt` field.
    pub fn display_prompt(&self) -> String {
        match (self.attribute_tag(), self.custom_prompt()) {
            (Some(attr), Some(prompt)) => format!("{}: {}", attr, prompt),
            (Some(attr), None) => attr.to_string(),
            (None, Some(prompt)) => prompt.to_string(),
            (None, None) => String::new(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_attribute_or_prompt() {
        let empty = GenerateVideoRequest::default();
        assert_eq!(empty.validate_request(), Err(RequestError::MissingInput));

        let blank = GenerateVideoRequest {
            attribute: Some("   ".to_string()),
            prompt: Some("".to_string()),
            duration: None,
        };
        assert_eq!(blank.validate_request(), Err(RequestError::MissingInput));

        assert!(GenerateVideoRequest::with_attribute("Fire").validate_request().is_ok());
        assert!(GenerateVideoRequest::with_prompt("a dragon").validate_request().is_ok());
    }

    #[test]
    fn test_duration_validation() {
        let ok = GenerateVideoRequest::with_attribute("Fire").duration_secs(10);
        assert!(ok.validate_request().is_ok());
        assert_eq!(ok.video_duration(), VideoDuration::Ten);

        let bad = GenerateVideoRequest::with_attribute("Fire").duration_secs(7);
        assert_eq!(bad.validate_request(), Err(RequestError::InvalidDuration(7)));

        assert_eq!(
            GenerateVideoRequest::with_attribute("Fire").video_duration(),
            VideoDuration::Five
        );
    }

    #[test]
    fn test_prompt_length_limit() {
        let long = GenerateVideoRequest::with_prompt("x".repeat(MAX_PROMPT_LENGTH + 1));
        assert!(matches!(long.validate_request(), Err(RequestError::Invalid(_))));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let req: GenerateVideoRequest =
            serde_json::from_str(r#"{"attribute":"Water","duration":5}"#).unwrap();
        assert_eq!(req.attribute_tag(), Some("Water"));
        assert_eq!(req.duration, Some(5));
        assert!(req.prompt.is_none());
    }

    #[test]
    fn test_display_prompt() {
        let req = GenerateVideoRequest {
            attribute: Some(" Fire ".to_string()),
            prompt: Some("on a cliff".to_string()),
            duration: None,
        };
        assert_eq!(req.display_prompt(), "Fire: on a cliff");
    }
}
