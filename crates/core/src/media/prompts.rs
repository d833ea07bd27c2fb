//! Prompt construction.
//!
//! Every visual prompt repeats the persona's identity line so the image
//! model keeps the same face and build across calls.

use crate::model::{ContentType, CreativeBrief, PersonaParameters, PlanItem};

/// Appended to every visual prompt.
pub const NEGATIVE_PROMPT: &str = "Do not include: user interface elements, instagram overlay, \
buttons, hearts, likes, comments, text overlay, app icons, split screen, collage, grid, \
multiple panels, blurry, low quality, distorted face, holding camera, visible camera device, \
phone in hand. Do not change facial features.";

/// Items produced per week of a content plan.
pub const ITEMS_PER_WEEK: usize = 4;

/// Characters of the script quoted in a selfie motion prompt.
const SELFIE_SCRIPT_CHARS: usize = 100;

/// Shot directions for the three slideshow frames, in order.
pub const SLIDE_SHOTS: [&str; 3] = [
    "Scene 1: Introduction shot.",
    "Scene 2: Action close up.",
    "Scene 3: Wide angle context.",
];

// ============================================================================
// Scene Hints
// ============================================================================

/// Keyword hints derived from an item description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneHints {
    /// The persona appears with friends or a group.
    pub social: bool,
    /// Natural look, minimal makeup.
    pub candid: bool,
}

impl SceneHints {
    pub fn from_description(description: &str) -> Self {
        let lower = description.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        Self {
            social: has(&["friends", "party", "group", "together"]),
            candid: has(&["natural", "no makeup", "casual"]),
        }
    }

    fn suffix(&self) -> String {
        let mut suffix = if self.social {
            "Shot includes the main character interacting with friends or a group. \
             Main character is the focus but environment is lively."
                .to_string()
        } else {
            "Single full frame image.".to_string()
        };
        if self.candid {
            suffix.push_str(" Authentic, candid, natural skin texture, less posed, minimal makeup.");
        }
        suffix
    }
}

fn consistency_line(params: &PersonaParameters) -> String {
    format!("Character consistency check: {}.", params.identity_line())
}

fn subject_context(params: &PersonaParameters, hints: SceneHints) -> String {
    let mut context = format!(
        "The character is a {}, {} style.",
        params.identity_line(),
        params.style
    );
    if let Some(personality) = params.personality.as_deref().filter(|p| !p.is_empty()) {
        context.push_str(&format!(" Personality: {}.", personality));
    }
    context.push_str(" Maintain facial features, hair, and body type EXACTLY as reference image.");
    if hints.social {
        context.push_str(" The main character is hanging out with friends.");
    }
    context
}

fn framing(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Post => "Rectangular 3:4 portrait",
        ContentType::Reel | ContentType::Story => "Vertical 9:16 portrait",
    }
}

// ============================================================================
// Identity Prompts
// ============================================================================

/// Close-up portrait that becomes the anchor image.
pub fn portrait_prompt(brief: &CreativeBrief, params: &PersonaParameters) -> String {
    format!(
        "{}. {} Photorealistic, 8k, highly detailed, studio lighting, looking at camera. \
         Vertical 9:16 portrait. Single full frame image. {}",
        brief.avatar_prompt,
        consistency_line(params),
        NEGATIVE_PROMPT
    )
}

/// Full body look of the anchored persona wearing `outfit`.
pub fn look_prompt(outfit: &str, params: &PersonaParameters) -> String {
    format!(
        "Full body shot of the SAME person in the reference image. Wearing: {}. {} \
         Maintain facial features, skin tone, hair color, and age EXACTLY as the reference. \
         Photorealistic, 8k, fashion photography. Vertical 9:16 portrait. Single full frame image. {}",
        outfit,
        consistency_line(params),
        NEGATIVE_PROMPT
    )
}

// ============================================================================
// Item Prompts
// ============================================================================

/// Still for a post or story, or the base frame of a reel.
pub fn scene_prompt(item: &PlanItem, params: &PersonaParameters, hints: SceneHints) -> String {
    format!(
        "Professional photography for social media. {}. {} \
         Photorealistic, 4k, cinematic lighting. {}. {} {} NO USER INTERFACE.",
        item.description,
        subject_context(params, hints),
        framing(item.content_type),
        hints.suffix(),
        NEGATIVE_PROMPT
    )
}

/// Motion direction for animating a reel's base frame.
pub fn motion_prompt(item: &PlanItem, hints: SceneHints) -> String {
    let atmosphere = if hints.social { " Lively atmosphere." } else { "" };
    format!(
        "Cinematic video, {}. Vertical 9:16 portrait. High quality.{} {}",
        item.description, atmosphere, NEGATIVE_PROMPT
    )
}

/// The three slideshow frame prompts, in `SLIDE_SHOTS` order.
pub fn slide_prompts(item: &PlanItem, params: &PersonaParameters) -> [String; 3] {
    let traits = if params.traits.is_empty() {
        String::new()
    } else {
        format!(" Visible features: {}.", params.traits.join(", "))
    };
    let base = format!(
        "Professional photography. {}. Character: {} {}.{} Photorealistic, 4k. \
         Vertical 9:16 aspect ratio. Single full frame. {}",
        item.description, params.gender, params.style, traits, NEGATIVE_PROMPT
    );
    SLIDE_SHOTS.map(|shot| format!("{} {}", base, shot))
}

/// Front-camera still of the persona, the first frame of a selfie clip.
pub fn selfie_prompt(params: &PersonaParameters) -> String {
    format!(
        "Close up selfie photo of the SAME person in the reference image. {}. \
         Holding the camera with an extended arm (POV). Looking directly at the lens. \
         Vertical 9:16 portrait. High quality vlog style. \
         Do not include: user interface elements, text overlay, split screen, blurry, \
         distorted face. Do not change facial features.",
        params.identity_line()
    )
}

/// Motion direction for a talking-head selfie. Only the opening of the
/// script is used.
pub fn selfie_motion_prompt(script: &str) -> String {
    let opening: String = script.chars().take(SELFIE_SCRIPT_CHARS).collect();
    format!(
        "Video selfie, talking to camera, arm held out, vlogging. Vertical 9:16 portrait. {}...",
        opening.trim()
    )
}

/// Motion direction for bringing a finished photo to life.
pub fn photo_motion_prompt(item: &PlanItem) -> String {
    format!(
        "Bring this photo to life with subtle, natural motion. {}. \
         Keep the framing and the person unchanged. Vertical 9:16 portrait.",
        item.description
    )
}

/// Continuation prompt for extending a reel.
pub fn extension_prompt(item: &PlanItem) -> String {
    if item.description.trim().is_empty() {
        "continue action".to_string()
    } else {
        format!("Continue the action: {}", item.description)
    }
}

// ============================================================================
// Text Prompts
// ============================================================================

/// System instruction for the creative brief.
pub fn brief_system(params: &PersonaParameters) -> String {
    let mut system = format!(
        "You are a creative director for a top-tier social media agency. \
         Design a unique visual identity for a new AI influencer.\n\
         Influencer specs: {}, {}, age {}, style {}.",
        params.gender, params.ethnicity, params.age, params.style
    );
    if let Some(body) = params.body_type.as_deref().filter(|b| !b.is_empty()) {
        system.push_str(&format!("\nPhysical build: {}.", body));
    }
    if let Some(personality) = params.personality.as_deref().filter(|p| !p.is_empty()) {
        system.push_str(&format!("\nPersonality vibe: {}.", personality));
    }
    if !params.traits.is_empty() {
        system.push_str(&format!("\nDistinctive features: {}.", params.traits.join(", ")));
    }
    if let Some(theme) = params.custom_theme.as_deref().filter(|t| !t.is_empty()) {
        system.push_str(&format!("\nFocus heavily on the specific theme: \"{}\".", theme));
    }
    system.push_str(&format!(
        "\nProvide output in {}.\nOutput JSON only.",
        params.output_language
    ));
    system
}

pub fn brief_prompt(params: &PersonaParameters) -> String {
    format!(
        r#"Generate a creative brief as a JSON object with these fields:
1. "avatarPrompt": detailed prompt for a photorealistic close-up face portrait (neutral expression, high end). It MUST include the physical build and ALL distinguishing features ({features}).
2. "wardrobePrompts": an object with 3 distinct outfits for the SAME character:
   - "casual": everyday lifestyle outfit.
   - "active": sporty or professional work outfit.
   - "glam": evening or creative outfit.
3. "voiceScript": a short, catchy 1-2 sentence spoken intro (max 15 words) in {language}."#,
        features = params.identity_line(),
        language = params.output_language
    )
}

pub fn plan_prompt(params: &PersonaParameters) -> String {
    let mut prompt = format!(
        "Create a {weeks}-week social media content calendar.\n\
         Specs: {gender}, {ethnicity}, {style}. Audience: {audience}.\n",
        weeks = params.plan_weeks,
        gender = params.gender,
        ethnicity = params.ethnicity,
        style = params.style,
        audience = params.audience,
    );
    if let Some(personality) = params.personality.as_deref().filter(|p| !p.is_empty()) {
        prompt.push_str(&format!("Personality: {}.\n", personality));
    }
    if let Some(theme) = params.custom_theme.as_deref().filter(|t| !t.is_empty()) {
        prompt.push_str(&format!("Focus specifically on: {}.\n", theme));
    }
    prompt.push_str(&format!(
        r#"OUTPUT LANGUAGE: {language}. All titles, captions, descriptions and scripts must be in {language}.
For each week, provide {per_week} diverse pieces of content.
IMPORTANT:
1. Include at least one selfie style photo per week.
2. Include at least one reel where the influencer talks to camera, with a short spoken "script".
3. Mix in content where the influencer is socializing: events, parties, or with friends.
4. Include some natural, candid moments: no makeup, morning routine, relaxing.
Respond with a JSON array, one object per week:
[{{"weekNumber": 1, "theme": "...", "items": [{{"day": 1, "type": "Post|Reel|Story", "title": "...", "description": "...", "caption": "...", "hashtags": ["..."], "script": "..."}}]}}]"#,
        language = params.output_language,
        per_week = ITEMS_PER_WEEK,
    ));
    prompt
}

pub fn week_rewrite_prompt(
    params: &PersonaParameters,
    week_number: u32,
    theme: &str,
    content_types: &[ContentType],
    language: &str,
) -> String {
    let types: Vec<&str> = content_types.iter().map(|t| t.as_str()).collect();
    format!(
        r#"Rewrite the content plan for week {week_number} for a {style} influencer.
NEW THEME for this week: "{theme}".
The output must contain exactly {count} items, with these types in this order: {types}.
OUTPUT LANGUAGE: {language}. All titles and captions must be in {language}.
Respond with a JSON array of items:
[{{"day": 1, "type": "...", "title": "...", "description": "...", "caption": "...", "hashtags": ["..."], "script": "..."}}]"#,
        week_number = week_number,
        style = params.style,
        theme = theme,
        count = content_types.len(),
        types = types.join(", "),
        language = language,
    )
}

pub fn single_item_prompt(params: &PersonaParameters, content_type: ContentType) -> String {
    format!(
        r#"Generate ONE single social media content idea for a {style} influencer.
Type: {content_type}.
Output in {language}.
JSON format: {{"day": 1, "type": "{content_type}", "title": "...", "description": "...", "caption": "...", "hashtags": ["..."]}}"#,
        style = params.style,
        content_type = content_type,
        language = params.output_language,
    )
}
