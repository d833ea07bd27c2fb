//! Text synthesis: creative brief, content plan and item rewrites.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::producer::{MediaProducer, RunLog};
use super::prompts;
use crate::model::{
    ContentType, CreativeBrief, LogLevel, PersonaParameters, PlanItemDraft, WeekDraft,
};
use crate::provider::{ProviderError, TextRequest, TextTask};
use crate::retry::GenerationError;

/// The planner answers either with a bare array of weeks or wrapped in an
/// object.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanResponse {
    Weeks(Vec<WeekDraft>),
    Wrapped { weeks: Vec<WeekDraft> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsResponse {
    Items(Vec<PlanItemDraft>),
    Wrapped { items: Vec<PlanItemDraft> },
}

impl MediaProducer {
    async fn complete(
        &self,
        request: TextRequest,
        log: &RunLog,
    ) -> Result<String, GenerationError> {
        let operation = request.task.as_str();
        let text = self.providers().text.as_ref();
        let response = self
            .call(operation, log, || text.generate_text(request.clone()))
            .await?;
        debug!(task = operation, len = response.len(), "Text response received");
        Ok(response)
    }

    /// Creative direction for the whole run.
    pub async fn brief(
        &self,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Result<CreativeBrief, GenerationError> {
        log.log(
            LogLevel::Info,
            "Generating creative brief and visual identity...",
        );
        let request = TextRequest::new(
            self.models().text.clone(),
            TextTask::CreativeBrief,
            prompts::brief_prompt(params),
        )
        .with_system(prompts::brief_system(params))
        .json();

        let response = self.complete(request, log).await?;
        parse_json(&response)
    }

    /// Multi-week content plan, truncated to `params.plan_weeks` weeks.
    pub async fn plan(
        &self,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Result<Vec<WeekDraft>, GenerationError> {
        log.log(
            LogLevel::Info,
            &format!("Developing {}-week content strategy...", params.plan_weeks),
        );
        let request = TextRequest::new(
            self.models().planner.clone(),
            TextTask::ContentPlan {
                weeks: params.plan_weeks,
            },
            prompts::plan_prompt(params),
        )
        .json();

        let response = self.complete(request, log).await?;
        let mut weeks = match parse_json::<PlanResponse>(&response)? {
            PlanResponse::Weeks(weeks) | PlanResponse::Wrapped { weeks } => weeks,
        };

        weeks.retain(|w| !w.items.is_empty());
        if weeks.is_empty() {
            return Err(GenerationError::Provider(ProviderError::EmptyResponse(
                "content plan has no items".to_string(),
            )));
        }
        if weeks.len() > params.plan_weeks as usize {
            warn!(
                requested = params.plan_weeks,
                returned = weeks.len(),
                "Planner returned extra weeks, truncating"
            );
            weeks.sort_by_key(|w| w.week_number);
            weeks.truncate(params.plan_weeks as usize);
        }
        Ok(weeks)
    }

    /// New text for every item of a week under a new theme. Returns exactly
    /// one draft per entry of `content_types`, with those types.
    pub async fn week_rewrite(
        &self,
        params: &PersonaParameters,
        week_number: u32,
        theme: &str,
        content_types: &[ContentType],
        language: &str,
        log: &RunLog,
    ) -> Result<Vec<PlanItemDraft>, GenerationError> {
        log.log(
            LogLevel::Info,
            &format!("Regenerating week {} with theme: {}", week_number, theme),
        );
        let request = TextRequest::new(
            self.models().text.clone(),
            TextTask::WeekRewrite {
                content_types: content_types.to_vec(),
            },
            prompts::week_rewrite_prompt(params, week_number, theme, content_types, language),
        )
        .json();

        let response = self.complete(request, log).await?;
        let mut drafts = match parse_json::<ItemsResponse>(&response)? {
            ItemsResponse::Items(items) | ItemsResponse::Wrapped { items } => items,
        };

        if drafts.len() < content_types.len() {
            return Err(GenerationError::Provider(ProviderError::Json(format!(
                "expected {} items, got {}",
                content_types.len(),
                drafts.len()
            ))));
        }
        drafts.truncate(content_types.len());
        for (draft, content_type) in drafts.iter_mut().zip(content_types) {
            draft.content_type = *content_type;
        }
        Ok(drafts)
    }

    /// One ad hoc item of the given type.
    pub async fn single_item(
        &self,
        params: &PersonaParameters,
        content_type: ContentType,
        log: &RunLog,
    ) -> Result<PlanItemDraft, GenerationError> {
        log.log(
            LogLevel::Info,
            &format!("Generating single {} idea...", content_type),
        );
        let request = TextRequest::new(
            self.models().text.clone(),
            TextTask::SingleItem { content_type },
            prompts::single_item_prompt(params, content_type),
        )
        .json();

        let response = self.complete(request, log).await?;
        let mut draft: PlanItemDraft = parse_json(&response)?;
        draft.content_type = content_type;
        draft.day = draft.day.clamp(1, 7);
        Ok(draft)
    }
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        GenerationError::Provider(ProviderError::Json(format!(
            "Failed to parse model response: {}",
            e
        )))
    })
}
