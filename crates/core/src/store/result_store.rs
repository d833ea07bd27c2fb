use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::results::GenerationResults;
use super::StoreError;
use crate::model::RunId;

/// Observable, copy-on-write holder of [`GenerationResults`].
///
/// Writers pass reducer closures that are evaluated against the latest state
/// under the channel lock, so concurrent writers never overwrite each other.
/// Every write names the run it belongs to; writes for a run that has since
/// been reset are discarded.
pub struct ResultStore {
    tx: watch::Sender<Arc<GenerationResults>>,
}

impl ResultStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(GenerationResults::default()));
        Self { tx }
    }

    /// Current state. The snapshot never changes after it is taken.
    pub fn snapshot(&self) -> Arc<GenerationResults> {
        Arc::clone(&self.tx.borrow())
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<GenerationResults>> {
        self.tx.subscribe()
    }

    /// Replace everything with empty results owned by `run_id`.
    pub fn reset(&self, run_id: Option<RunId>) {
        self.tx
            .send_replace(Arc::new(GenerationResults::for_run(run_id)));
    }

    /// Apply `reducer` to the latest state of `run_id`.
    ///
    /// Observers are notified when the reducer returns `Ok(true)`. A reducer
    /// error leaves the state as it was, as far as observers can tell.
    pub fn apply<F>(&self, run_id: RunId, reducer: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut GenerationResults) -> Result<bool, StoreError>,
    {
        self.apply_with(run_id, |results| {
            let changed = reducer(results)?;
            Ok((changed, changed))
        })
    }

    /// Like [`apply`](Self::apply), for reducers that also return a value.
    /// The reducer returns `(value, changed)`.
    pub fn apply_with<F, R>(&self, run_id: RunId, reducer: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut GenerationResults) -> Result<(R, bool), StoreError>,
    {
        let mut outcome = Err(StoreError::StaleRun);
        self.tx.send_if_modified(|current| {
            if current.run_id != Some(run_id) {
                return false;
            }
            // Reduce on a shallow copy so a failing reducer leaves no trace.
            let mut next = GenerationResults::clone(current);
            match reducer(&mut next) {
                Ok((value, changed)) => {
                    if changed {
                        *current = Arc::new(next);
                    }
                    outcome = Ok(value);
                    changed
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });

        if matches!(outcome, Err(StoreError::StaleRun)) {
            debug!(%run_id, "Discarded write for stale run");
        }
        outcome
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Asset, ContentType, ItemStatus, MediaBlob, PlanItemDraft, WardrobeLook, WeekDraft,
    };
    use crate::store::ContentPlan;

    fn store_with_plan(run_id: RunId) -> ResultStore {
        let store = ResultStore::new();
        store.reset(Some(run_id));
        store
            .apply(run_id, |results| {
                results.plan = Some(ContentPlan::from_drafts(vec![WeekDraft {
                    week_number: 1,
                    theme: None,
                    items: (1..=3)
                        .map(|day| PlanItemDraft {
                            day,
                            content_type: ContentType::Post,
                            title: format!("Day {}", day),
                            description: String::new(),
                            caption: String::new(),
                            hashtags: vec![],
                            script: None,
                        })
                        .collect(),
                }]));
                Ok(true)
            })
            .unwrap();
        store
    }

    fn asset() -> Asset {
        Asset::image(MediaBlob::new("image/png", vec![9u8]))
    }

    #[test]
    fn test_mark_ready_twice_equals_once() {
        let run = RunId::new();
        let store = store_with_plan(run);
        let id = store.snapshot().plan().unwrap().item_id_at(0, 0).unwrap();

        store
            .apply(run, |r| r.plan_mut()?.mark_generating(id))
            .unwrap();
        assert!(store
            .apply(run, |r| r.plan_mut()?.mark_ready(id, asset()))
            .unwrap());
        let once = store.snapshot();

        let mut rx = store.subscribe();
        rx.borrow_and_update();
        assert!(!store
            .apply(run, |r| r.plan_mut()?.mark_ready(id, asset()))
            .unwrap());
        assert_eq!(*store.snapshot(), *once);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_stale_run_writes_are_discarded() {
        let old = RunId::new();
        let store = store_with_plan(old);
        let new = RunId::new();
        store.reset(Some(new));

        let result = store.apply(old, |r| {
            r.push_look(WardrobeLook::new("late", MediaBlob::new("image/png", vec![1u8])));
            Ok(true)
        });
        assert_eq!(result, Err(StoreError::StaleRun));
        assert!(store.snapshot().wardrobe.is_empty());
        assert!(store.snapshot().plan.is_none());
    }

    #[test]
    fn test_failed_reducer_leaves_state_untouched() {
        let run = RunId::new();
        let store = store_with_plan(run);
        let before = store.snapshot();
        let id = before.plan().unwrap().item_id_at(0, 0).unwrap();

        let result = store.apply(run, |r| {
            r.push_look(WardrobeLook::new("x", MediaBlob::new("image/png", vec![1u8])));
            r.plan_mut()?.mark_ready(id, asset())
        });
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let run = RunId::new();
        let store = store_with_plan(run);
        let snapshot = store.snapshot();
        let id = snapshot.plan().unwrap().item_id_at(0, 1).unwrap();

        store
            .apply(run, |r| r.plan_mut()?.mark_generating(id))
            .unwrap();

        assert_eq!(
            snapshot.plan().unwrap().item(id).unwrap().status,
            ItemStatus::Empty
        );
        assert_eq!(
            store.snapshot().plan().unwrap().item(id).unwrap().status,
            ItemStatus::Generating
        );
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_lose_updates() {
        let run = RunId::new();
        let store = Arc::new(store_with_plan(run));
        let ids: Vec<_> = store
            .snapshot()
            .plan()
            .unwrap()
            .week_item_ids(0)
            .unwrap()
            .to_vec();

        let handles: Vec<_> = ids
            .iter()
            .copied()
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.apply(run, |r| r.plan_mut()?.mark_generating(id))?;
                    tokio::task::yield_now().await;
                    store.apply(run, |r| r.plan_mut()?.mark_ready(id, asset()))
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = store.snapshot();
        let plan = snapshot.plan().unwrap();
        for id in ids {
            assert_eq!(plan.item(id).unwrap().status, ItemStatus::Ready);
        }
    }
}
