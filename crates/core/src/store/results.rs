use std::sync::Arc;

use serde::Serialize;

use super::plan::ContentPlan;
use super::StoreError;
use crate::model::{CreativeBrief, MediaBlob, PersonaParameters, RunId, WardrobeLook};

/// Everything a run has produced so far.
///
/// Cloning is shallow: every field is either small or `Arc`-shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationResults {
    /// Run these results belong to. Writes for any other run are discarded.
    pub run_id: Option<RunId>,
    /// Parameters captured when the run started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Arc<PersonaParameters>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brief: Option<Arc<CreativeBrief>>,
    /// Ordered looks; the first one is the identity anchor.
    pub wardrobe: Arc<Vec<WardrobeLook>>,
    /// Spoken intro produced on approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<MediaBlob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ContentPlan>,
}

impl GenerationResults {
    pub fn for_run(run_id: Option<RunId>) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    /// The identity anchor every later visual is conditioned on.
    pub fn anchor(&self) -> Option<&WardrobeLook> {
        self.wardrobe.first()
    }

    pub fn plan(&self) -> Result<&ContentPlan, StoreError> {
        self.plan.as_ref().ok_or(StoreError::NoPlan)
    }

    pub fn plan_mut(&mut self) -> Result<&mut ContentPlan, StoreError> {
        self.plan.as_mut().ok_or(StoreError::NoPlan)
    }

    pub fn params(&self) -> Option<&Arc<PersonaParameters>> {
        self.params.as_ref()
    }

    pub fn set_brief(&mut self, brief: CreativeBrief) {
        self.brief = Some(Arc::new(brief));
    }

    pub fn set_wardrobe(&mut self, looks: Vec<WardrobeLook>) {
        self.wardrobe = Arc::new(looks);
    }

    pub fn push_look(&mut self, look: WardrobeLook) {
        Arc::make_mut(&mut self.wardrobe).push(look);
    }

    /// Drop everything downstream of the identity: plan and narration.
    pub fn clear_campaign(&mut self) {
        self.plan = None;
        self.narration = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_is_first_look() {
        let mut results = GenerationResults::default();
        assert!(results.anchor().is_none());
        results.push_look(WardrobeLook::new(
            "Portrait",
            MediaBlob::new("image/png", vec![1u8]),
        ));
        results.push_look(WardrobeLook::new(
            "Casual",
            MediaBlob::new("image/png", vec![2u8]),
        ));
        assert_eq!(results.anchor().unwrap().label, "Portrait");
    }

    #[test]
    fn test_plan_required() {
        let mut results = GenerationResults::default();
        assert_eq!(results.plan().unwrap_err(), StoreError::NoPlan);
        assert!(results.plan_mut().is_err());
    }
}
