//! Persona card: a portable record of a persona's identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PersonaParameters, WardrobeLook};

pub const PERSONA_CARD_VERSION: u32 = 1;

/// Parameters and identity anchor of a persona, for seeding a later run
/// with the same face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaCard {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub params: PersonaParameters,
    pub anchor: WardrobeLook,
}

impl PersonaCard {
    pub fn new(params: PersonaParameters, anchor: WardrobeLook) -> Self {
        Self {
            format_version: PERSONA_CARD_VERSION,
            exported_at: Utc::now(),
            params,
            anchor,
        }
    }

    /// Parameters for a new run that imports the anchor instead of
    /// generating a wardrobe.
    pub fn into_seed(self) -> PersonaParameters {
        PersonaParameters {
            reference_image: Some(self.anchor.image),
            ..self.params
        }
    }
}
