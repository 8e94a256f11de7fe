//! Prompt texts handed to the media generator.

use serde::{Deserialize, Serialize};

/// Prompts for one job: the still image, the motion pass and what the
/// video model should avoid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSet {
    pub image_prompt: String,
    pub video_prompt: String,
    pub negative_prompt: String,
}
