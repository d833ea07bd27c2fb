//! Persona parameters and identity artifacts.

use serde::{Deserialize, Serialize};

use super::media::MediaBlob;

/// Maximum number of weeks a content plan may span.
pub const MAX_PLAN_WEEKS: u32 = 6;

/// Immutable description of the persona, captured when a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaParameters {
    pub gender: String,
    pub ethnicity: String,
    pub age: u32,
    /// Visual and lifestyle style, e.g. "fitness" or "professional".
    pub style: String,
    pub audience: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    /// Distinctive visible features, e.g. "freckles".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<String>,
    #[serde(default = "default_output_language")]
    pub output_language: String,
    /// Existing identity image. When present, wardrobe generation is skipped
    /// and this image becomes the anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<MediaBlob>,
    /// Number of weeks in the content plan (1..=6).
    #[serde(default = "default_plan_weeks")]
    pub plan_weeks: u32,
    /// Number of leading weeks whose media is produced automatically on approval.
    #[serde(default)]
    pub auto_generate_weeks: u32,
}

fn default_output_language() -> String {
    "English".to_string()
}

fn default_plan_weeks() -> u32 {
    1
}

impl PersonaParameters {
    /// Check value ranges. Returns a human readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.gender.trim().is_empty() {
            return Err("gender cannot be empty".to_string());
        }
        if !(18..=99).contains(&self.age) {
            return Err(format!("age must be between 18 and 99, got {}", self.age));
        }
        if !(1..=MAX_PLAN_WEEKS).contains(&self.plan_weeks) {
            return Err(format!(
                "plan_weeks must be between 1 and {}, got {}",
                MAX_PLAN_WEEKS, self.plan_weeks
            ));
        }
        if self.auto_generate_weeks > self.plan_weeks {
            return Err(format!(
                "auto_generate_weeks ({}) cannot exceed plan_weeks ({})",
                self.auto_generate_weeks, self.plan_weeks
            ));
        }
        Ok(())
    }

    pub fn is_male(&self) -> bool {
        matches!(self.gender.trim().to_lowercase().as_str(), "male" | "man" | "m")
    }

    /// Single line physical description reused by every visual prompt so
    /// identity stays consistent across calls.
    pub fn identity_line(&self) -> String {
        let mut line = format!("{} year old {} {}", self.age, self.ethnicity, self.gender);
        if let Some(body) = self.body_type.as_deref().filter(|b| !b.is_empty()) {
            line.push_str(&format!(", {} build", body));
        }
        if !self.traits.is_empty() {
            line.push_str(&format!(". Distinctive features: {}", self.traits.join(", ")));
        }
        line
    }
}

/// Creative direction produced once per run and reused verbatim by every
/// later visual call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeBrief {
    pub avatar_prompt: String,
    pub wardrobe_prompts: WardrobePrompts,
    pub voice_script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardrobePrompts {
    pub casual: String,
    pub active: String,
    pub glam: String,
}

impl WardrobePrompts {
    /// Outfits in wardrobe order with their look labels.
    pub fn labelled(&self) -> [(&'static str, &str); 3] {
        [
            ("Casual", self.casual.as_str()),
            ("Active", self.active.as_str()),
            ("Glam", self.glam.as_str()),
        ]
    }
}

impl CreativeBrief {
    /// Brief used when the text provider returns something unparseable.
    pub fn fallback(params: &PersonaParameters) -> Self {
        Self {
            avatar_prompt: format!(
                "Portrait of {}yo {} {}, {} style",
                params.age, params.ethnicity, params.gender, params.style
            ),
            wardrobe_prompts: WardrobePrompts {
                casual: "Casual outfit".to_string(),
                active: "Active outfit".to_string(),
                glam: "Elegant outfit".to_string(),
            },
            voice_script: "Hello world, welcome to my blog!".to_string(),
        }
    }
}

/// One labelled look of the wardrobe. The first look of a run is the anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardrobeLook {
    pub label: String,
    pub image: MediaBlob,
}

impl WardrobeLook {
    pub fn new(label: impl Into<String>, image: MediaBlob) -> Self {
        Self {
            label: label.into(),
            image,
        }
    }
}
