//! Generation pipeline implementation.
//!
//! Drives a run through its phases:
//! - Identity: creative brief, then anchor portrait and wardrobe (or an
//!   imported reference image)
//! - Campaign: content plan, intro narration and a bounded batch of item
//!   media
//! - Follow-ups on a finished run: single items, video extension, selfies,
//!   photo animation, extra looks, week rewrites and ad hoc content

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ModelConfig;
use crate::executor::{BoundedExecutor, PoolStatus};
use crate::media::{MediaProducer, RunSink, REFERENCE_LABEL};
use crate::metrics;
use crate::model::{
    Asset, AssetKind, ContentType, CreativeBrief, CredentialAlert, GenerationPhase, ItemEdit,
    ItemStatus, LogLevel, MediaBlob, PersonaParameters, PlanItem, PlanItemId, RunId, RunStatus,
    VideoHandle, WardrobeLook,
};
use crate::provider::{ProviderError, Providers};
use crate::retry::GenerationError;
use crate::store::{ContentPlan, GenerationResults, ResultStore, StoreError};

use super::config::PipelineConfig;
use super::export::PersonaCard;
use super::types::{Command, PipelineError};

struct Inner {
    producer: MediaProducer,
    config: PipelineConfig,
    executor: BoundedExecutor,
    status: watch::Sender<RunStatus>,
    store: ResultStore,
    /// Serializes the synchronous part of `dispatch` with `reset`.
    control: Mutex<()>,
}

/// The generation pipeline: one logical run at a time, observable through
/// watch channels.
///
/// Cloning is cheap; clones share the same run.
#[derive(Clone)]
pub struct GenerationPipeline {
    inner: Arc<Inner>,
}

/// Work prepared by `dispatch`, executed on a spawned task.
enum Job {
    Identity {
        params: Arc<PersonaParameters>,
    },
    Campaign {
        params: Arc<PersonaParameters>,
        brief: Option<Arc<CreativeBrief>>,
        anchor: MediaBlob,
    },
    Item {
        id: PlanItemId,
        params: Arc<PersonaParameters>,
        anchor: MediaBlob,
    },
    Extend {
        id: PlanItemId,
        item: PlanItem,
        handle: VideoHandle,
        previous: Asset,
    },
    Selfie {
        id: PlanItemId,
        script: String,
        /// The item was ready; the new clip replaces its asset in place.
        reshoot: bool,
        params: Arc<PersonaParameters>,
        anchor: MediaBlob,
    },
    Animate {
        id: PlanItemId,
        item: PlanItem,
        photo: MediaBlob,
    },
    Look {
        description: String,
        params: Arc<PersonaParameters>,
        anchor: MediaBlob,
    },
    Week {
        week: usize,
        week_number: u32,
        theme: String,
        language: String,
        content_types: Vec<ContentType>,
        params: Arc<PersonaParameters>,
    },
    Content {
        week: usize,
        content_type: ContentType,
        params: Arc<PersonaParameters>,
    },
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Identity { .. } => "identity",
            Job::Campaign { .. } => "campaign",
            Job::Item { .. } => "item",
            Job::Extend { .. } => "extend",
            Job::Selfie { .. } => "selfie",
            Job::Animate { .. } => "animate",
            Job::Look { .. } => "look",
            Job::Week { .. } => "week",
            Job::Content { .. } => "content",
        }
    }
}

/// Holds the busy flag for one guarded operation. Dropping it releases the
/// flag unless a reset has handed it to someone else in the meantime.
struct BusyGuard {
    inner: Arc<Inner>,
    token: u64,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let token = self.token;
        self.inner.status.send_if_modified(|status| {
            if status.busy && status.busy_token == token {
                status.busy = false;
                true
            } else {
                false
            }
        });
    }
}

/// Handle used by a job to report on its run. Every update is dropped once
/// the run is no longer current.
#[derive(Clone)]
struct RunContext {
    inner: Arc<Inner>,
    run_id: RunId,
}

impl RunContext {
    fn update(&self, f: impl FnOnce(&mut RunStatus)) -> bool {
        let run_id = self.run_id;
        self.inner.status.send_if_modified(|status| {
            if status.run_id != Some(run_id) {
                return false;
            }
            f(status);
            true
        })
    }

    /// Append to the run log and mirror the message to tracing.
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => error!(run_id = %self.run_id, "{}", message),
            LogLevel::Warning => warn!(run_id = %self.run_id, "{}", message),
            LogLevel::Info | LogLevel::Success => info!(run_id = %self.run_id, "{}", message),
        }
        self.update(|status| status.push_log(level, message));
    }

    /// Sink handed to the media producer.
    fn run_log(&self) -> RunContext {
        self.clone()
    }

    fn progress(&self, progress: u8, text: impl Into<String>) {
        let text = text.into();
        self.update(|status| {
            status.advance(progress);
            status.status_text = text;
        });
    }

    fn finish_phase(&self, phase: GenerationPhase, text: &str) {
        info!(run_id = %self.run_id, phase = %phase, "Phase reached");
        self.update(|status| {
            status.enter_phase(phase);
            status.advance(100);
            status.status_text = text.to_string();
        });
    }

    fn flag_credentials(&self, error: &GenerationError) {
        if let Some(alert) = error.credential_alert() {
            self.update(|status| status.credential_alert = Some(alert));
        }
    }

    /// Record a run-level failure. Captured parameters stay in the store.
    fn fail(&self, error: &PipelineError) {
        let alert = match error {
            PipelineError::Generation(e) => e.credential_alert(),
            _ => None,
        };
        let message = format!("Generation failed: {}", error);
        error!(run_id = %self.run_id, error = %error, "Run failed");
        self.update(|status| {
            status.enter_phase(GenerationPhase::Failed);
            status.status_text = "Generation failed".to_string();
            status.current_error = Some(error.to_string());
            if alert.is_some() {
                status.credential_alert = alert;
            }
            status.push_log(LogLevel::Error, message);
        });
        metrics::RUNS.with_label_values(&["failed"]).inc();
    }

    fn apply<F>(&self, reducer: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut GenerationResults) -> Result<bool, StoreError>,
    {
        self.inner.store.apply(self.run_id, reducer)
    }

    /// Latest results of this run.
    fn snapshot(&self) -> Result<Arc<GenerationResults>, StoreError> {
        let results = self.inner.store.snapshot();
        if results.run_id != Some(self.run_id) {
            return Err(StoreError::StaleRun);
        }
        Ok(results)
    }
}

impl RunSink for RunContext {
    fn log(&self, level: LogLevel, message: &str) {
        RunContext::log(self, level, message)
    }

    fn credential_alert(&self, alert: CredentialAlert) {
        self.update(|status| status.credential_alert = Some(alert));
    }
}

impl GenerationPipeline {
    pub fn new(providers: Providers, models: ModelConfig, config: PipelineConfig) -> Self {
        let producer = MediaProducer::new(
            providers,
            models,
            config.retry.clone(),
            config.video.clone(),
        );
        let executor = BoundedExecutor::new("media", config.batch_concurrency);
        let (status, _rx) = watch::channel(RunStatus::default());

        Self {
            inner: Arc::new(Inner {
                producer,
                config,
                executor,
                status,
                store: ResultStore::new(),
                control: Mutex::new(()),
            }),
        }
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn status(&self) -> RunStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RunStatus> {
        self.inner.status.subscribe()
    }

    pub fn results(&self) -> Arc<GenerationResults> {
        self.inner.store.snapshot()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Arc<GenerationResults>> {
        self.inner.store.subscribe()
    }

    pub fn executor_status(&self) -> PoolStatus {
        self.inner.executor.status()
    }

    // ========================================================================
    // Guarded operations
    // ========================================================================

    /// Validate and start a guarded operation.
    ///
    /// Rejections (busy, wrong phase, bad input, unknown week or item) are
    /// returned immediately. On success the work runs on a spawned task and
    /// the returned handle resolves with its outcome.
    pub fn dispatch(
        &self,
        command: Command,
    ) -> Result<JoinHandle<Result<(), PipelineError>>, PipelineError> {
        let operation = command.name();
        let (guard, ctx, job) = {
            let _control = self
                .inner
                .control
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let guard = self.acquire(&command)?;
            let (run_id, job) = self.prepare(command)?;
            let ctx = RunContext {
                inner: Arc::clone(&self.inner),
                run_id,
            };
            (guard, ctx, job)
        };
        debug!(operation, run_id = %ctx.run_id, "Dispatched");

        let pipeline = self.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            pipeline.execute(&ctx, job).await
        }))
    }

    async fn run(&self, command: Command) -> Result<(), PipelineError> {
        let handle = self.dispatch(command)?;
        handle
            .await
            .map_err(|e| PipelineError::Internal(format!("pipeline task failed: {}", e)))?
    }

    /// Capture `params` and produce the persona's identity.
    pub async fn start(&self, params: PersonaParameters) -> Result<(), PipelineError> {
        self.run(Command::Start(Box::new(params))).await
    }

    /// Accept the identity and produce the campaign.
    pub async fn approve(&self) -> Result<(), PipelineError> {
        self.run(Command::Approve).await
    }

    /// Produce a new identity from the captured parameters.
    pub async fn regenerate_identity(&self) -> Result<(), PipelineError> {
        self.run(Command::RegenerateIdentity).await
    }

    pub async fn regenerate_item(&self, week: usize, item: usize) -> Result<(), PipelineError> {
        self.run(Command::RegenerateItem { week, item }).await
    }

    pub async fn extend_video(&self, week: usize, item: usize) -> Result<(), PipelineError> {
        self.run(Command::ExtendVideo { week, item }).await
    }

    pub async fn record_selfie(&self, week: usize, item: usize) -> Result<(), PipelineError> {
        self.run(Command::RecordSelfie { week, item }).await
    }

    pub async fn animate_photo(&self, week: usize, item: usize) -> Result<(), PipelineError> {
        self.run(Command::AnimatePhoto { week, item }).await
    }

    pub async fn add_wardrobe_item(&self, description: &str) -> Result<(), PipelineError> {
        self.run(Command::AddWardrobeItem {
            description: description.to_string(),
        })
        .await
    }

    pub async fn regenerate_week(
        &self,
        week: usize,
        theme: &str,
        language: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.run(Command::RegenerateWeek {
            week,
            theme: theme.to_string(),
            language: language.map(str::to_string),
        })
        .await
    }

    pub async fn add_content(
        &self,
        week: usize,
        content_type: ContentType,
    ) -> Result<(), PipelineError> {
        self.run(Command::AddContent { week, content_type }).await
    }

    // ========================================================================
    // Unguarded operations
    // ========================================================================

    /// Back to idle, discarding the run. Work still in flight keeps running
    /// but its results are dropped.
    pub fn reset(&self) {
        let _control = self
            .inner
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = self.inner.status.borrow().run_id;
        self.inner.status.send_modify(|status| {
            status.busy_token += 1;
            status.busy = false;
            status.run_id = None;
            status.phase = GenerationPhase::Idle;
            status.progress = 0;
            status.status_text.clear();
            status.current_error = None;
            status.credential_alert = None;
            status.logs.clear();
        });
        self.inner.store.reset(None);

        if let Some(run_id) = previous {
            info!(%run_id, "Run reset");
            metrics::RUNS.with_label_values(&["reset"]).inc();
        }
    }

    /// Edit the text of a plan item in place. Returns whether anything
    /// changed.
    pub fn update_item(
        &self,
        week: usize,
        item: usize,
        edit: ItemEdit,
    ) -> Result<bool, PipelineError> {
        if edit.is_empty() {
            return Err(PipelineError::InvalidParameters(
                "edit changes no field".to_string(),
            ));
        }
        let run_id = self.inner.store.snapshot().run_id.ok_or(StoreError::NoPlan)?;
        let changed = self.inner.store.apply(run_id, |results| {
            let plan = results.plan_mut()?;
            let id = plan.item_id_at(week, item)?;
            plan.edit_item(id, &edit)
        })?;
        debug!(%run_id, week, item, changed, "Plan item edited");
        Ok(changed)
    }

    /// Parameters and anchor of the current persona.
    pub fn export_persona_card(&self) -> Result<PersonaCard, PipelineError> {
        let results = self.results();
        let params = results.params().ok_or_else(|| {
            PipelineError::NotReady("no persona parameters captured".to_string())
        })?;
        let anchor = results.anchor().cloned().ok_or(PipelineError::MissingAnchor)?;

        // The anchor carries the reference image; the card keeps one copy.
        let params = PersonaParameters {
            reference_image: None,
            ..PersonaParameters::clone(params)
        };
        Ok(PersonaCard::new(params, anchor))
    }

    // ========================================================================
    // Dispatch internals
    // ========================================================================

    fn acquire(&self, command: &Command) -> Result<BusyGuard, PipelineError> {
        let mut outcome = Err(PipelineError::Busy);
        self.inner.status.send_if_modified(|status| {
            if status.busy {
                return false;
            }
            if !command.allowed_in(status.phase) {
                outcome = Err(PipelineError::InvalidPhase {
                    operation: command.name(),
                    phase: status.phase,
                });
                return false;
            }
            status.busy = true;
            status.busy_token += 1;
            outcome = Ok(status.busy_token);
            true
        });

        let token = outcome?;
        Ok(BusyGuard {
            inner: Arc::clone(&self.inner),
            token,
        })
    }

    /// Resolve and check everything the command needs, applying the
    /// synchronous part of its state change.
    fn prepare(&self, command: Command) -> Result<(RunId, Job), PipelineError> {
        let params = match command {
            Command::Start(params) => {
                params
                    .validate()
                    .map_err(PipelineError::InvalidParameters)?;
                Arc::new(*params)
            }
            Command::RegenerateIdentity => self.current_run()?.2,
            command => return self.prepare_follow_up(command),
        };

        let run_id = self.begin_run(Arc::clone(&params))?;
        metrics::RUNS.with_label_values(&["started"]).inc();
        Ok((run_id, Job::Identity { params }))
    }

    /// Commands that continue the current run.
    fn prepare_follow_up(&self, command: Command) -> Result<(RunId, Job), PipelineError> {
        let (results, run_id, params) = self.current_run()?;

        let job = match command {
            Command::Start(_) | Command::RegenerateIdentity => {
                return Err(PipelineError::Internal(format!(
                    "{} does not continue a run",
                    command.name()
                )))
            }
            Command::Approve => {
                let anchor = anchor_of(&results)?;
                self.inner.store.apply(run_id, |r| {
                    r.clear_campaign();
                    Ok(true)
                })?;
                self.set_running(
                    run_id,
                    Some(GenerationPhase::CampaignProduction),
                    "Planning content...",
                );
                Job::Campaign {
                    params,
                    brief: results.brief.clone(),
                    anchor,
                }
            }
            Command::RegenerateItem { week, item } => {
                let anchor = anchor_of(&results)?;
                let id = results.plan()?.item_id_at(week, item)?;
                self.inner
                    .store
                    .apply(run_id, |r| r.plan_mut()?.mark_generating(id))?;
                self.set_running(run_id, None, "Regenerating media...");
                Job::Item { id, params, anchor }
            }
            Command::ExtendVideo { week, item } => {
                let plan = results.plan()?;
                let id = plan.item_id_at(week, item)?;
                let plan_item = plan.item(id).ok_or(StoreError::ItemNotFound(id))?;
                let (handle, previous) = extendable(plan_item)?;
                self.set_running(run_id, None, "Extending video clip...");
                Job::Extend {
                    id,
                    item: plan_item.clone(),
                    handle,
                    previous,
                }
            }
            Command::RecordSelfie { week, item } => {
                let anchor = anchor_of(&results)?;
                let plan = results.plan()?;
                let id = plan.item_id_at(week, item)?;
                let plan_item = plan.item(id).ok_or(StoreError::ItemNotFound(id))?;
                let script = plan_item
                    .narration_text()
                    .ok_or_else(|| {
                        PipelineError::NotReady("item has no script or caption".to_string())
                    })?
                    .to_string();
                let reshoot = match plan_item.status {
                    ItemStatus::Ready => true,
                    ItemStatus::Empty | ItemStatus::Failed => {
                        self.inner
                            .store
                            .apply(run_id, |r| r.plan_mut()?.mark_generating(id))?;
                        false
                    }
                    ItemStatus::Generating => {
                        return Err(PipelineError::NotReady(
                            "item is already generating".to_string(),
                        ))
                    }
                };
                self.set_running(run_id, None, "Recording selfie video...");
                Job::Selfie {
                    id,
                    script,
                    reshoot,
                    params,
                    anchor,
                }
            }
            Command::AnimatePhoto { week, item } => {
                let plan = results.plan()?;
                let id = plan.item_id_at(week, item)?;
                let plan_item = plan.item(id).ok_or(StoreError::ItemNotFound(id))?;
                let photo = animatable(plan_item)?;
                self.set_running(run_id, None, "Animating photo...");
                Job::Animate {
                    id,
                    item: plan_item.clone(),
                    photo,
                }
            }
            Command::AddWardrobeItem { description } => {
                let description = description.trim().to_string();
                if description.is_empty() {
                    return Err(PipelineError::InvalidParameters(
                        "look description cannot be empty".to_string(),
                    ));
                }
                let anchor = anchor_of(&results)?;
                self.set_running(run_id, None, "Creating new custom look...");
                Job::Look {
                    description,
                    params,
                    anchor,
                }
            }
            Command::RegenerateWeek {
                week,
                theme,
                language,
            } => {
                let plan = results.plan()?;
                let content_types = plan
                    .week_item_ids(week)?
                    .iter()
                    .filter_map(|id| plan.item(*id))
                    .map(|item| item.content_type)
                    .collect();
                let week_number = plan.week_number(week).unwrap_or(week as u32 + 1);
                let language = language
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| params.output_language.clone());
                self.set_running(run_id, None, &format!("Rewriting Week {}...", week_number));
                Job::Week {
                    week,
                    week_number,
                    theme,
                    language,
                    content_types,
                    params,
                }
            }
            Command::AddContent { week, content_type } => {
                results.plan()?.week_item_ids(week)?;
                self.set_running(run_id, None, "Adding content...");
                Job::Content {
                    week,
                    content_type,
                    params,
                }
            }
        };
        Ok((run_id, job))
    }

    /// Results, id and captured parameters of the current run.
    fn current_run(
        &self,
    ) -> Result<(Arc<GenerationResults>, RunId, Arc<PersonaParameters>), PipelineError> {
        let results = self.inner.store.snapshot();
        let run_id = results
            .run_id
            .ok_or_else(|| PipelineError::NotReady("no active run".to_string()))?;
        let params = results.params().cloned().ok_or_else(|| {
            PipelineError::NotReady("no persona parameters captured".to_string())
        })?;
        Ok((results, run_id, params))
    }

    /// Open a fresh run for `params`: new id, empty results, clean status.
    fn begin_run(&self, params: Arc<PersonaParameters>) -> Result<RunId, PipelineError> {
        let run_id = RunId::new();
        self.inner.store.reset(Some(run_id));
        self.inner.store.apply(run_id, |r| {
            r.params = Some(params);
            Ok(true)
        })?;
        self.inner.status.send_modify(|status| {
            status.run_id = Some(run_id);
            status.enter_phase(GenerationPhase::IdentityDraft);
            status.progress = 0;
            status.status_text = "Starting...".to_string();
            status.current_error = None;
            status.credential_alert = None;
            status.logs.clear();
        });
        info!(%run_id, "Run started");
        Ok(run_id)
    }

    fn set_running(&self, run_id: RunId, phase: Option<GenerationPhase>, text: &str) {
        self.inner.status.send_if_modified(|status| {
            if status.run_id != Some(run_id) {
                return false;
            }
            if let Some(phase) = phase {
                status.enter_phase(phase);
                status.current_error = None;
            }
            status.status_text = text.to_string();
            true
        });
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    async fn execute(&self, ctx: &RunContext, job: Job) -> Result<(), PipelineError> {
        let name = job.name();
        let result = match job {
            Job::Identity { params } => {
                let started = Instant::now();
                let result = self.produce_identity(ctx, &params).await;
                observe_phase("identity", started, &result);
                self.fail_run(ctx, result)
            }
            Job::Campaign {
                params,
                brief,
                anchor,
            } => {
                let started = Instant::now();
                let result = self
                    .produce_campaign(ctx, &params, brief.as_deref(), &anchor)
                    .await;
                observe_phase("campaign", started, &result);
                self.fail_run(ctx, result)
            }
            Job::Item { id, params, anchor } => self
                .produce_item(ctx, id, &anchor, &params)
                .await
                .map(|_| ()),
            Job::Extend {
                id,
                item,
                handle,
                previous,
            } => self.extend(ctx, id, &item, &handle, &previous).await,
            Job::Selfie {
                id,
                script,
                reshoot,
                params,
                anchor,
            } => {
                self.selfie(ctx, id, &script, reshoot, &anchor, &params)
                    .await
            }
            Job::Animate { id, item, photo } => self.animate(ctx, id, &item, &photo).await,
            Job::Look {
                description,
                params,
                anchor,
            } => self.add_look(ctx, &description, &anchor, &params).await,
            Job::Week {
                week,
                week_number,
                theme,
                language,
                content_types,
                params,
            } => {
                self.rewrite_week(
                    ctx,
                    week,
                    week_number,
                    theme,
                    &language,
                    &content_types,
                    &params,
                )
                .await
            }
            Job::Content {
                week,
                content_type,
                params,
            } => self.insert_content(ctx, week, content_type, &params).await,
        };

        match result {
            Err(PipelineError::Store(StoreError::StaleRun)) => {
                debug!(run_id = %ctx.run_id, job = name, "Run was reset, dropping job output");
                Ok(())
            }
            other => other,
        }
    }

    /// Turn a fatal error into the Failed phase.
    fn fail_run(
        &self,
        ctx: &RunContext,
        result: Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        match result {
            Err(PipelineError::Store(StoreError::StaleRun)) => result,
            Err(e) => {
                ctx.fail(&e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    async fn produce_identity(
        &self,
        ctx: &RunContext,
        params: &PersonaParameters,
    ) -> Result<(), PipelineError> {
        let producer = &self.inner.producer;
        let log = ctx.run_log();

        ctx.progress(10, "Designing creative brief...");
        let brief = match producer.brief(params, &log).await {
            Ok(brief) => brief,
            Err(GenerationError::Provider(ProviderError::Json(e))) => {
                ctx.log(
                    LogLevel::Warning,
                    &format!("Creative brief unreadable, using defaults: {}", e),
                );
                CreativeBrief::fallback(params)
            }
            Err(e) => return Err(e.into()),
        };
        ctx.apply(|r| {
            r.set_brief(brief.clone());
            Ok(true)
        })?;
        ctx.progress(25, "Creating visual identity...");

        if let Some(reference) = params.reference_image.clone() {
            ctx.log(
                LogLevel::Info,
                "Using provided reference image as identity anchor",
            );
            ctx.apply(|r| {
                r.set_wardrobe(vec![WardrobeLook::new(REFERENCE_LABEL, reference)]);
                Ok(true)
            })?;
        } else {
            let portrait = producer.portrait(&brief, params, &log).await?;
            let anchor = portrait.image.clone();
            ctx.apply(|r| {
                r.set_wardrobe(vec![portrait]);
                Ok(true)
            })?;
            ctx.progress(50, "Styling wardrobe...");

            let looks = brief.wardrobe_prompts.labelled();
            let total = looks.len();
            for (index, (label, outfit)) in looks.into_iter().enumerate() {
                match producer.look(label, outfit, &anchor, params, &log).await {
                    Ok(look) => {
                        ctx.apply(|r| {
                            r.push_look(look);
                            Ok(true)
                        })?;
                    }
                    Err(e) => {
                        ctx.log(
                            LogLevel::Warning,
                            &format!("Look '{}' failed: {}", label, e),
                        );
                        ctx.flag_credentials(&e);
                    }
                }
                let done = 50 + 50 * (index + 1) / total;
                ctx.progress(done as u8, format!("Styled {} look", label));
            }
        }

        ctx.finish_phase(GenerationPhase::ReviewIdentity, "Model ready for approval");
        ctx.log(LogLevel::Success, "Visual identity ready for review");
        metrics::RUNS.with_label_values(&["identity_ready"]).inc();
        Ok(())
    }

    async fn produce_campaign(
        &self,
        ctx: &RunContext,
        params: &PersonaParameters,
        brief: Option<&CreativeBrief>,
        anchor: &MediaBlob,
    ) -> Result<(), PipelineError> {
        let producer = &self.inner.producer;
        let log = ctx.run_log();

        ctx.progress(10, "Developing content strategy...");
        let weeks = producer.plan(params, &log).await?;
        let plan = ContentPlan::from_drafts(weeks);
        let batch = plan.leading_item_ids(params.auto_generate_weeks as usize);
        let summary = format!(
            "Content plan ready: {} weeks, {} items",
            plan.week_count(),
            plan.item_count()
        );
        ctx.apply(|r| {
            r.plan = Some(plan);
            Ok(true)
        })?;
        ctx.log(LogLevel::Success, &summary);
        ctx.progress(30, "Recording intro narration...");

        let script = brief
            .map(|b| b.voice_script.trim())
            .filter(|s| !s.is_empty());
        if let Some(script) = script {
            if let Some(audio) = producer.narrate(script, params, &log).await {
                ctx.apply(|r| {
                    r.narration = Some(audio);
                    Ok(true)
                })?;
            }
        }
        ctx.progress(50, "Narration ready");

        if !batch.is_empty() {
            self.produce_batch(ctx, batch, anchor, params).await?;
        }

        ctx.finish_phase(GenerationPhase::Complete, "Media pack complete!");
        ctx.log(LogLevel::Success, "Media pack complete");
        metrics::RUNS.with_label_values(&["completed"]).inc();
        Ok(())
    }

    /// Produce media for `ids` under the executor's ceiling. Item failures
    /// are isolated; only a reset stops the batch from completing.
    async fn produce_batch(
        &self,
        ctx: &RunContext,
        ids: Vec<PlanItemId>,
        anchor: &MediaBlob,
        params: &PersonaParameters,
    ) -> Result<(), PipelineError> {
        ctx.log(
            LogLevel::Info,
            &format!("Producing media for {} items", ids.len()),
        );

        let report = self
            .inner
            .executor
            .run(
                ids,
                move |_, id| async move {
                    ctx.apply(|r| r.plan_mut()?.mark_generating(id))?;
                    self.produce_item(ctx, id, anchor, params).await
                },
                |settlement| {
                    let done = 50 + 50 * settlement.settled / settlement.total.max(1);
                    ctx.progress(
                        done as u8,
                        format!(
                            "Producing asset {}/{}",
                            settlement.settled, settlement.total
                        ),
                    );
                },
            )
            .await;

        if report
            .outcomes
            .iter()
            .any(|o| matches!(o, Err(PipelineError::Store(StoreError::StaleRun))))
        {
            return Err(StoreError::StaleRun.into());
        }
        if !report.all_succeeded() {
            ctx.log(
                LogLevel::Warning,
                &format!("{} of {} items failed", report.failed, report.total),
            );
        }
        Ok(())
    }

    /// Produce the asset of an item already marked generating.
    async fn produce_item(
        &self,
        ctx: &RunContext,
        id: PlanItemId,
        anchor: &MediaBlob,
        params: &PersonaParameters,
    ) -> Result<AssetKind, PipelineError> {
        let item = ctx
            .snapshot()?
            .plan()?
            .item(id)
            .cloned()
            .ok_or(StoreError::ItemNotFound(id))?;
        let log = ctx.run_log();

        metrics::ITEMS_IN_FLIGHT.inc();
        let result = self
            .inner
            .producer
            .produce_item(&item, anchor, params, &log)
            .await;
        metrics::ITEMS_IN_FLIGHT.dec();

        match result {
            Ok(asset) => {
                let kind = asset.kind;
                ctx.apply(|r| r.plan_mut()?.mark_ready(id, asset))?;
                metrics::ITEMS_PRODUCED
                    .with_label_values(&["ready", kind.as_str()])
                    .inc();
                ctx.log(
                    LogLevel::Success,
                    &format!("Created {}: {}", kind.as_str(), item.title),
                );
                Ok(kind)
            }
            Err(e) => {
                ctx.apply(|r| r.plan_mut()?.mark_failed(id))?;
                metrics::ITEMS_PRODUCED
                    .with_label_values(&["failed", item.content_type.as_str()])
                    .inc();
                ctx.log(
                    LogLevel::Error,
                    &format!("Failed to generate {}: {}", item.title, e),
                );
                ctx.flag_credentials(&e);
                Err(e.into())
            }
        }
    }

    async fn extend(
        &self,
        ctx: &RunContext,
        id: PlanItemId,
        item: &PlanItem,
        handle: &VideoHandle,
        previous: &Asset,
    ) -> Result<(), PipelineError> {
        let log = ctx.run_log();
        let result = self
            .inner
            .producer
            .extend_video(item, handle, previous, &log)
            .await;
        let outcome = match result {
            Ok(asset) => {
                ctx.apply(|r| r.plan_mut()?.replace_asset(id, asset))?;
                ctx.log(LogLevel::Success, &format!("Video extended: {}", item.title));
                Ok(())
            }
            Err(e) => {
                ctx.log(LogLevel::Error, &format!("Video extension failed: {}", e));
                ctx.flag_credentials(&e);
                Err(e.into())
            }
        };
        ctx.progress(100, "Ready");
        outcome
    }

    async fn selfie(
        &self,
        ctx: &RunContext,
        id: PlanItemId,
        script: &str,
        reshoot: bool,
        anchor: &MediaBlob,
        params: &PersonaParameters,
    ) -> Result<(), PipelineError> {
        let log = ctx.run_log();
        metrics::ITEMS_IN_FLIGHT.inc();
        let result = self
            .inner
            .producer
            .selfie(script, anchor, params, &log)
            .await;
        metrics::ITEMS_IN_FLIGHT.dec();

        let outcome = match result {
            Ok(asset) => {
                ctx.apply(|r| {
                    let plan = r.plan_mut()?;
                    if reshoot {
                        plan.replace_asset(id, asset)
                    } else {
                        plan.mark_ready(id, asset)
                    }
                })?;
                metrics::ITEMS_PRODUCED
                    .with_label_values(&["ready", AssetKind::Video.as_str()])
                    .inc();
                ctx.log(LogLevel::Success, "Selfie video recorded");
                Ok(())
            }
            Err(e) => {
                // A reshoot keeps the item's previous asset.
                if !reshoot {
                    ctx.apply(|r| r.plan_mut()?.mark_failed(id))?;
                }
                metrics::ITEMS_PRODUCED
                    .with_label_values(&["failed", AssetKind::Video.as_str()])
                    .inc();
                ctx.log(LogLevel::Error, &format!("Selfie generation failed: {}", e));
                ctx.flag_credentials(&e);
                Err(e.into())
            }
        };
        ctx.progress(100, "Ready");
        outcome
    }

    async fn animate(
        &self,
        ctx: &RunContext,
        id: PlanItemId,
        item: &PlanItem,
        photo: &MediaBlob,
    ) -> Result<(), PipelineError> {
        let log = ctx.run_log();
        let result = self
            .inner
            .producer
            .animate_photo(item, photo, &log)
            .await;
        let outcome = match result {
            Ok(asset) => {
                ctx.apply(|r| r.plan_mut()?.replace_asset(id, asset))?;
                ctx.log(LogLevel::Success, &format!("Photo animated: {}", item.title));
                Ok(())
            }
            Err(e) => {
                ctx.log(LogLevel::Error, &format!("Photo animation failed: {}", e));
                ctx.flag_credentials(&e);
                Err(e.into())
            }
        };
        ctx.progress(100, "Ready");
        outcome
    }

    async fn add_look(
        &self,
        ctx: &RunContext,
        description: &str,
        anchor: &MediaBlob,
        params: &PersonaParameters,
    ) -> Result<(), PipelineError> {
        let log = ctx.run_log();
        let result = self
            .inner
            .producer
            .look(description, description, anchor, params, &log)
            .await;
        let outcome = match result {
            Ok(look) => {
                ctx.apply(|r| {
                    r.push_look(look);
                    Ok(true)
                })?;
                ctx.log(LogLevel::Success, &format!("New look added: {}", description));
                Ok(())
            }
            Err(e) => {
                ctx.log(LogLevel::Error, &format!("Custom look failed: {}", e));
                ctx.flag_credentials(&e);
                Err(e.into())
            }
        };
        ctx.progress(100, "Ready");
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn rewrite_week(
        &self,
        ctx: &RunContext,
        week: usize,
        week_number: u32,
        theme: String,
        language: &str,
        content_types: &[ContentType],
        params: &PersonaParameters,
    ) -> Result<(), PipelineError> {
        let log = ctx.run_log();
        let result = self
            .inner
            .producer
            .week_rewrite(params, week_number, &theme, content_types, language, &log)
            .await;
        let outcome = match result {
            Ok(drafts) => {
                let theme = Some(theme).filter(|t| !t.trim().is_empty());
                let rewritten = ctx.inner.store.apply_with(ctx.run_id, |r| {
                    let rewritten = r.plan_mut()?.rewrite_week(week, theme, drafts)?;
                    Ok((rewritten, true))
                })?;
                ctx.log(
                    LogLevel::Success,
                    &format!("Week {} rewritten ({} items)", week_number, rewritten),
                );
                Ok(())
            }
            Err(e) => {
                ctx.log(
                    LogLevel::Error,
                    &format!("Failed to regenerate week {}: {}", week_number, e),
                );
                ctx.flag_credentials(&e);
                Err(e.into())
            }
        };
        ctx.progress(100, "Ready");
        outcome
    }

    async fn insert_content(
        &self,
        ctx: &RunContext,
        week: usize,
        content_type: ContentType,
        params: &PersonaParameters,
    ) -> Result<(), PipelineError> {
        let log = ctx.run_log();
        let result = self
            .inner
            .producer
            .single_item(params, content_type, &log)
            .await;
        let outcome = match result {
            Ok(draft) => {
                let item = PlanItem::from_draft(draft);
                let title = item.title.clone();
                ctx.inner.store.apply_with(ctx.run_id, |r| {
                    let id = r.plan_mut()?.insert_item(week, item)?;
                    Ok((id, true))
                })?;
                ctx.log(LogLevel::Success, &format!("Added {}: {}", content_type, title));
                Ok(())
            }
            Err(e) => {
                ctx.log(LogLevel::Error, &format!("Failed to add content: {}", e));
                ctx.flag_credentials(&e);
                Err(e.into())
            }
        };
        ctx.progress(100, "Ready");
        outcome
    }
}

fn anchor_of(results: &GenerationResults) -> Result<MediaBlob, PipelineError> {
    results
        .anchor()
        .map(|look| look.image.clone())
        .ok_or(PipelineError::MissingAnchor)
}

/// Handle and current asset of a ready video item.
fn extendable(item: &PlanItem) -> Result<(VideoHandle, Asset), PipelineError> {
    if item.status != ItemStatus::Ready {
        return Err(PipelineError::NotReady(format!(
            "item is {}, not ready",
            item.status
        )));
    }
    let asset = item
        .asset
        .as_ref()
        .filter(|a| a.kind == AssetKind::Video)
        .ok_or_else(|| PipelineError::NotReady("item has no video".to_string()))?;
    let handle = asset
        .video_handle
        .clone()
        .ok_or_else(|| PipelineError::NotReady("video has no handle".to_string()))?;
    Ok((handle, asset.clone()))
}

/// Still of a ready image item.
fn animatable(item: &PlanItem) -> Result<MediaBlob, PipelineError> {
    if item.status != ItemStatus::Ready {
        return Err(PipelineError::NotReady(format!(
            "item is {}, not ready",
            item.status
        )));
    }
    item.asset
        .as_ref()
        .filter(|a| a.kind == AssetKind::Image)
        .map(|a| a.media.clone())
        .ok_or_else(|| PipelineError::NotReady("item has no photo".to_string()))
}

fn observe_phase(phase: &str, started: Instant, result: &Result<(), PipelineError>) {
    let outcome = match result {
        Ok(()) => "success",
        Err(PipelineError::Store(StoreError::StaleRun)) => "abandoned",
        Err(_) => "failure",
    };
    metrics::PHASE_DURATION
        .with_label_values(&[phase, outcome])
        .observe(started.elapsed().as_secs_f64());
}
