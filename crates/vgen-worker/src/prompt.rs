//! Prompt construction.
//!
//! Turns an attribute tag plus a style seed into image, video and negative
//! prompts. The seed drives every random choice, so a job re-run from its
//! stored seed gets the same prompts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vgen_models::{GenerateVideoRequest, PromptSet};

pub const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality, distorted anatomy, extra limbs, \
deformed hands, duplicated face, text, watermark, logo, flicker, jitter, sudden cuts";

/// Builds prompts for a job. Must be total and deterministic in the seed.
pub trait PromptBuilder: Send + Sync {
    fn build(&self, request: &GenerateVideoRequest, style_seed: u64) -> PromptSet;
}

/// Elemental attribute driving the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Fire,
    Water,
    Thunder,
    Wind,
    Earth,
    Ice,
    Light,
    Dark,
}

struct Profile {
    aura: &'static str,
    backdrop: &'static str,
    palette: &'static str,
    motion: &'static str,
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::Fire,
        Attribute::Water,
        Attribute::Thunder,
        Attribute::Wind,
        Attribute::Earth,
        Attribute::Ice,
        Attribute::Light,
        Attribute::Dark,
    ];

    /// Used when a tag is missing or unrecognized.
    pub const BASELINE: Attribute = Attribute::Fire;

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Fire => "Fire",
            Attribute::Water => "Water",
            Attribute::Thunder => "Thunder",
            Attribute::Wind => "Wind",
            Attribute::Earth => "Earth",
            Attribute::Ice => "Ice",
            Attribute::Light => "Light",
            Attribute::Dark => "Dark",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(tag))
    }

    /// Lookup falling back to the baseline attribute.
    pub fn from_tag(tag: Option<&str>) -> Self {
        tag.and_then(Self::parse).unwrap_or(Self::BASELINE)
    }

    fn profile(&self) -> Profile {
        match self {
            Attribute::Fire => Profile {
                aura: "swirling flames and rising embers around the body",
                backdrop: "volcanic ridge under a smoldering sky",
                palette: "crimson and amber glow",
                motion: "flames surge upward as the character raises one hand, embers drifting past the lens",
            },
            Attribute::Water => Profile {
                aura: "ribbons of clear water orbiting the body",
                backdrop: "moonlit lagoon with gentle waves",
                palette: "deep blue and aquamarine reflections",
                motion: "water ribbons spiral and splash as the character turns, droplets catching the light",
            },
            Attribute::Thunder => Profile {
                aura: "crackling lightning arcs along the arms",
                backdrop: "storm-covered plateau with dark clouds",
                palette: "electric violet and white flashes",
                motion: "lightning bursts from the palms and the sky flashes in rhythm",
            },
            Attribute::Wind => Profile {
                aura: "visible gusts carrying leaves and petals",
                backdrop: "grassy cliff top above a sea of clouds",
                palette: "soft jade and sky blue",
                motion: "a strong gust sweeps through, hair and clothes flowing as leaves spin around",
            },
            Attribute::Earth => Profile {
                aura: "floating rock fragments and glowing runes",
                backdrop: "ancient canyon with towering stone pillars",
                palette: "ochre, moss green and warm sunlight",
                motion: "rocks rise from the ground and orbit slowly as the character plants their feet",
            },
            Attribute::Ice => Profile {
                aura: "frost crystals forming in the air",
                backdrop: "frozen lake beneath aurora lights",
                palette: "pale cyan and silver",
                motion: "ice crystals bloom outward from the character's breath as snow begins to fall",
            },
            Attribute::Light => Profile {
                aura: "halo of radiant light and drifting feathers",
                backdrop: "sunlit cathedral of clouds",
                palette: "gold and pearl white",
                motion: "beams of light open behind the character as feathers drift down",
            },
            Attribute::Dark => Profile {
                aura: "shadow tendrils and violet mist",
                backdrop: "ruined castle under a blood moon",
                palette: "black, deep purple and crimson accents",
                motion: "shadows coil around the character and the mist pulses with each step",
            },
        }
    }
}

const WARDROBES: &[&str] = &[
    "ornate battle armor with flowing cape",
    "long hooded mage robe with embroidered trim",
    "sleek modern streetwear jacket",
    "traditional kimono with layered sleeves",
    "light leather adventurer outfit",
    "royal uniform with gold epaulettes",
];

const HAIRSTYLES: &[&str] = &[
    "long straight hair",
    "short spiky hair",
    "high ponytail",
    "wavy shoulder-length hair",
    "braided crown hairstyle",
    "messy bob cut",
];

const CAMERA_PATTERNS: &[&str] = &[
    "slow dolly-in from full body to medium close-up",
    "smooth 180-degree orbit around the character",
    "low-angle tilt up revealing the character against the sky",
    "steady tracking shot moving sideways with the character",
    "gentle crane shot rising from ground level",
];

/// Default prompt builder based on elemental attributes.
#[derive(Debug, Clone, Default)]
pub struct AttributePromptBuilder;

impl AttributePromptBuilder {
    pub fn new() -> Self {
        Self
    }
}

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options[rng.random_range(0..options.len())]
}

impl PromptBuilder for AttributePromptBuilder {
    fn build(&self, request: &GenerateVideoRequest, style_seed: u64) -> PromptSet {
        let custom = request.custom_prompt();

        if let (None, Some(prompt)) = (request.attribute_tag(), custom) {
            return PromptSet {
                image_prompt: prompt.to_string(),
                video_prompt: prompt.to_string(),
                negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            };
        }

        let attribute = Attribute::from_tag(request.attribute_tag());
        let profile = attribute.profile();
        let mut rng = StdRng::seed_from_u64(style_seed);
        let wardrobe = pick(&mut rng, WARDROBES);
        let hair = pick(&mut rng, HAIRSTYLES);
        let camera = pick(&mut rng, CAMERA_PATTERNS);

        let mut image_prompt = format!(
            "anime style full-body character of the {} element, {}, {}, {}, {}, {}, \
             highly detailed, cinematic lighting, vertical composition",
            attribute.as_str().to_lowercase(),
            wardrobe,
            hair,
            profile.aura,
            profile.backdrop,
            profile.palette
        );
        let mut video_prompt = format!(
            "{}. Camera: {}. Consistent character design, smooth natural motion",
            profile.motion, camera
        );

        if let Some(extra) = custom {
            image_prompt.push_str(", ");
            image_prompt.push_str(extra);
            video_prompt.push_str(". ");
            video_prompt.push_str(extra);
        }

        PromptSet {
            image_prompt,
            video_prompt,
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        }
    }
}
