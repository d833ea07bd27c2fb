//! Content plan types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::{AspectRatio, Asset};

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier of a plan item. Survives text rewrites and media
/// regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanItemId(pub Uuid);

impl PlanItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Content Type & Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[serde(alias = "Post", alias = "POST")]
    Post,
    #[serde(alias = "Reel", alias = "REEL", alias = "video", alias = "Video")]
    Reel,
    #[serde(alias = "Story", alias = "STORY")]
    Story,
}

impl ContentType {
    /// Reels take the video path; everything else is a still.
    pub fn is_video(&self) -> bool {
        matches!(self, ContentType::Reel)
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        match self {
            ContentType::Post => AspectRatio::Portrait,
            ContentType::Reel | ContentType::Story => AspectRatio::Vertical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Reel => "reel",
            ContentType::Story => "story",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media lifecycle of a plan item.
///
/// Allowed transitions: `Empty -> Generating -> {Ready, Failed}` and
/// `Failed -> Generating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Empty,
    Generating,
    Ready,
    Failed,
}

impl ItemStatus {
    /// Whether media generation may start from this status.
    pub fn can_generate(&self) -> bool {
        matches!(self, ItemStatus::Empty | ItemStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Empty => "empty",
            ItemStatus::Generating => "generating",
            ItemStatus::Ready => "ready",
            ItemStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Plan Items
// ============================================================================

/// One scheduled entry of the content calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: PlanItemId,
    pub day: u32,
    pub content_type: ContentType,
    pub title: String,
    pub description: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Spoken narration for reels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,
}

impl PlanItem {
    pub fn from_draft(draft: PlanItemDraft) -> Self {
        Self {
            id: PlanItemId::new(),
            day: draft.day,
            content_type: draft.content_type,
            title: draft.title,
            description: draft.description,
            caption: draft.caption,
            hashtags: draft.hashtags,
            script: draft.script.filter(|s| !s.trim().is_empty()),
            status: ItemStatus::Empty,
            asset: None,
        }
    }

    /// Overwrite the text fields with a rewritten draft, keeping identity,
    /// content type, status and media.
    pub fn apply_rewrite(&mut self, draft: PlanItemDraft) {
        self.day = draft.day;
        self.title = draft.title;
        self.description = draft.description;
        self.caption = draft.caption;
        self.hashtags = draft.hashtags;
        self.script = draft.script.filter(|s| !s.trim().is_empty());
    }

    /// Text to narrate over a slideshow or video, if any.
    pub fn narration_text(&self) -> Option<&str> {
        self.script
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(self.caption.as_str()).filter(|c| !c.trim().is_empty()))
    }
}

/// Plan item as returned by the text provider, before it gets an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItemDraft {
    #[serde(default = "default_day")]
    pub day: u32,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub script: Option<String>,
}

fn default_day() -> u32 {
    1
}

/// One week as returned by the text provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekDraft {
    pub week_number: u32,
    #[serde(default)]
    pub theme: Option<String>,
    pub items: Vec<PlanItemDraft>,
}

/// Read-only view of one week with its items in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyPlan {
    pub week_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub items: Vec<PlanItem>,
}

/// Manual text edit of a plan item. Absent fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
    #[serde(default)]
    pub script: Option<String>,
}

impl ItemEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.caption.is_none()
            && self.hashtags.is_none()
            && self.script.is_none()
    }

    /// Apply the edit. Returns whether anything changed.
    pub fn apply(&self, item: &mut PlanItem) -> bool {
        let before = item.clone();
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(caption) = &self.caption {
            item.caption = caption.clone();
        }
        if let Some(hashtags) = &self.hashtags {
            item.hashtags = hashtags.clone();
        }
        if let Some(script) = &self.script {
            item.script = Some(script.clone()).filter(|s| !s.trim().is_empty());
        }
        *item != before
    }
}
