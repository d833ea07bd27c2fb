//! Arena storage for the content plan.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::StoreError;
use crate::model::{
    Asset, ItemEdit, ItemStatus, PlanItem, PlanItemDraft, PlanItemId, WeekDraft, WeeklyPlan,
};

#[derive(Debug, Clone, PartialEq)]
struct WeekSlot {
    week_number: u32,
    theme: Option<String>,
    item_ids: Vec<PlanItemId>,
}

/// Weeks hold ordered item ids; items live in an id-keyed map.
///
/// Both levels are `Arc`-shared and copied on write, so a mutation of one
/// item clones the map of `Arc`s but not the other items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentPlan {
    weeks: Arc<Vec<WeekSlot>>,
    items: Arc<HashMap<PlanItemId, Arc<PlanItem>>>,
}

impl ContentPlan {
    /// Build a plan from drafts, assigning fresh ids. Weeks are ordered by
    /// week number.
    pub fn from_drafts(mut drafts: Vec<WeekDraft>) -> Self {
        drafts.sort_by_key(|w| w.week_number);
        let mut weeks = Vec::with_capacity(drafts.len());
        let mut items = HashMap::new();

        for week in drafts {
            let mut item_ids = Vec::with_capacity(week.items.len());
            for draft in week.items {
                let item = PlanItem::from_draft(draft);
                item_ids.push(item.id);
                items.insert(item.id, Arc::new(item));
            }
            weeks.push(WeekSlot {
                week_number: week.week_number,
                theme: week.theme,
                item_ids,
            });
        }

        Self {
            weeks: Arc::new(weeks),
            items: Arc::new(items),
        }
    }

    pub fn week_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Every item, in no particular order.
    pub fn items(&self) -> impl Iterator<Item = &PlanItem> {
        self.items.values().map(|item| item.as_ref())
    }

    pub fn item(&self, id: PlanItemId) -> Option<&PlanItem> {
        self.items.get(&id).map(|item| item.as_ref())
    }

    pub fn week_number(&self, week: usize) -> Option<u32> {
        self.weeks.get(week).map(|w| w.week_number)
    }

    pub fn week_item_ids(&self, week: usize) -> Result<&[PlanItemId], StoreError> {
        self.weeks
            .get(week)
            .map(|w| w.item_ids.as_slice())
            .ok_or(StoreError::WeekNotFound(week))
    }

    /// Id of the item at a (week, item) position, both 0-based.
    pub fn item_id_at(&self, week: usize, item: usize) -> Result<PlanItemId, StoreError> {
        self.week_item_ids(week)?
            .get(item)
            .copied()
            .ok_or(StoreError::ItemNotFoundAt { week, item })
    }

    /// Ids of every item in the first `weeks` weeks, in plan order.
    pub fn leading_item_ids(&self, weeks: usize) -> Vec<PlanItemId> {
        self.weeks
            .iter()
            .take(weeks)
            .flat_map(|w| w.item_ids.iter().copied())
            .collect()
    }

    /// Materialized view of one week.
    pub fn week(&self, week: usize) -> Option<WeeklyPlan> {
        let slot = self.weeks.get(week)?;
        Some(WeeklyPlan {
            week_number: slot.week_number,
            theme: slot.theme.clone(),
            items: slot
                .item_ids
                .iter()
                .filter_map(|id| self.items.get(id))
                .map(|item| PlanItem::clone(item))
                .collect(),
        })
    }

    /// Materialized view of every week.
    pub fn weeks(&self) -> Vec<WeeklyPlan> {
        (0..self.weeks.len()).filter_map(|w| self.week(w)).collect()
    }

    fn item_mut(&mut self, id: PlanItemId) -> Result<&mut PlanItem, StoreError> {
        let items = Arc::make_mut(&mut self.items);
        items
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or(StoreError::ItemNotFound(id))
    }

    fn status_of(&self, id: PlanItemId) -> Result<ItemStatus, StoreError> {
        self.item(id)
            .map(|item| item.status)
            .ok_or(StoreError::ItemNotFound(id))
    }

    // ========================================================================
    // Status transitions
    // ========================================================================

    /// `Empty | Failed -> Generating`.
    pub fn mark_generating(&mut self, id: PlanItemId) -> Result<bool, StoreError> {
        let from = self.status_of(id)?;
        if !from.can_generate() {
            return Err(StoreError::InvalidTransition {
                id,
                from,
                to: ItemStatus::Generating,
            });
        }
        self.item_mut(id)?.status = ItemStatus::Generating;
        Ok(true)
    }

    /// `Generating -> Ready` with the produced asset.
    ///
    /// Repeating the call with the same asset is a no-op and returns
    /// `Ok(false)`.
    pub fn mark_ready(&mut self, id: PlanItemId, asset: Asset) -> Result<bool, StoreError> {
        let current = self.item(id).ok_or(StoreError::ItemNotFound(id))?;
        let (status, unchanged) = (current.status, current.asset.as_ref() == Some(&asset));
        match status {
            ItemStatus::Generating => {
                let item = self.item_mut(id)?;
                item.status = ItemStatus::Ready;
                item.asset = Some(asset);
                Ok(true)
            }
            ItemStatus::Ready if unchanged => Ok(false),
            from => Err(StoreError::InvalidTransition {
                id,
                from,
                to: ItemStatus::Ready,
            }),
        }
    }

    /// `Generating -> Failed`. Repeating it is a no-op.
    pub fn mark_failed(&mut self, id: PlanItemId) -> Result<bool, StoreError> {
        match self.status_of(id)? {
            ItemStatus::Generating => {
                self.item_mut(id)?.status = ItemStatus::Failed;
                Ok(true)
            }
            ItemStatus::Failed => Ok(false),
            from => Err(StoreError::InvalidTransition {
                id,
                from,
                to: ItemStatus::Failed,
            }),
        }
    }

    /// Swap the asset of a ready item, e.g. after extending its video.
    pub fn replace_asset(&mut self, id: PlanItemId, asset: Asset) -> Result<bool, StoreError> {
        let current = self.item(id).ok_or(StoreError::ItemNotFound(id))?;
        if current.status != ItemStatus::Ready {
            return Err(StoreError::InvalidTransition {
                id,
                from: current.status,
                to: ItemStatus::Ready,
            });
        }
        if current.asset.as_ref() == Some(&asset) {
            return Ok(false);
        }
        self.item_mut(id)?.asset = Some(asset);
        Ok(true)
    }

    // ========================================================================
    // Text mutations
    // ========================================================================

    pub fn edit_item(&mut self, id: PlanItemId, edit: &ItemEdit) -> Result<bool, StoreError> {
        let mut updated = self.item(id).ok_or(StoreError::ItemNotFound(id))?.clone();
        if !edit.apply(&mut updated) {
            return Ok(false);
        }
        *self.item_mut(id)? = updated;
        Ok(true)
    }

    /// Rewrite the text of a week's items in order, keeping ids, content
    /// types, statuses and assets. Extra drafts are ignored; items without a
    /// draft keep their text. Returns the number of items rewritten.
    pub fn rewrite_week(
        &mut self,
        week: usize,
        theme: Option<String>,
        drafts: Vec<PlanItemDraft>,
    ) -> Result<usize, StoreError> {
        let ids = self.week_item_ids(week)?.to_vec();
        let mut rewritten = 0;
        for (id, draft) in ids.into_iter().zip(drafts) {
            self.item_mut(id)?.apply_rewrite(draft);
            rewritten += 1;
        }
        if theme.is_some() {
            let weeks = Arc::make_mut(&mut self.weeks);
            if let Some(slot) = weeks.get_mut(week) {
                slot.theme = theme;
            }
        }
        Ok(rewritten)
    }

    /// Append a new item to a week.
    pub fn insert_item(&mut self, week: usize, item: PlanItem) -> Result<PlanItemId, StoreError> {
        if week >= self.weeks.len() {
            return Err(StoreError::WeekNotFound(week));
        }
        let id = item.id;
        Arc::make_mut(&mut self.items).insert(id, Arc::new(item));
        if let Some(slot) = Arc::make_mut(&mut self.weeks).get_mut(week) {
            slot.item_ids.push(id);
        }
        Ok(id)
    }
}

impl Serialize for ContentPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.weeks().serialize(serializer)
    }
}
