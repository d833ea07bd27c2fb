//! Generation lifecycle integration tests.
//!
//! These tests drive the whole pipeline against the mock provider:
//! idle -> identity draft -> review -> campaign production -> complete
//! plus the failure, fallback and reset paths.

use std::sync::Arc;
use std::time::Duration;

use personaforge_core::{
    model::{AssetKind, CredentialAlert, ItemStatus, LogLevel},
    provider::ProviderError,
    testing::{fixtures, Capability, MockProvider},
    Command, GenerationPhase, GenerationPipeline, PersonaParameters, PipelineConfig,
    PipelineError,
};
use tokio_test::{assert_err, assert_ok};

fn params(plan_weeks: u32, auto_generate_weeks: u32) -> PersonaParameters {
    PersonaParameters {
        plan_weeks,
        auto_generate_weeks,
        ..fixtures::persona_parameters()
    }
}

async fn reviewed(mock: &Arc<MockProvider>, params: PersonaParameters) -> GenerationPipeline {
    let pipeline = fixtures::pipeline(mock.clone());
    pipeline.start(params).await.expect("start failed");
    assert_eq!(pipeline.status().phase, GenerationPhase::ReviewIdentity);
    pipeline
}

fn quota_error() -> ProviderError {
    ProviderError::Api {
        status: 429,
        message: "RESOURCE_EXHAUSTED: Quota exceeded for metric images, limit: 0".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_run_produces_leading_weeks_only() {
    let mock = Arc::new(MockProvider::new());
    let pipeline = reviewed(&mock, params(2, 1)).await;

    assert_ok!(pipeline.approve().await);

    let status = pipeline.status();
    assert_eq!(status.phase, GenerationPhase::Complete);
    assert_eq!(status.progress, 100);
    assert_eq!(status.status_text, "Media pack complete!");
    assert!(!status.busy);
    assert!(status.current_error.is_none());

    let results = pipeline.results();
    let weeks = results.plan().unwrap().weeks();
    assert_eq!(weeks.len(), 2);
    assert!(weeks[0]
        .items
        .iter()
        .all(|i| matches!(i.status, ItemStatus::Ready | ItemStatus::Failed)));
    assert!(weeks[1].items.iter().all(|i| i.status == ItemStatus::Empty));
    assert!(results.narration.is_some());

    // The reel of the first week went through the video path.
    let reel = &weeks[0].items[1];
    let asset = reel.asset.as_ref().unwrap();
    assert_eq!(asset.kind, AssetKind::Video);
    assert!(asset.video_handle.is_some());
    assert!(asset.narration.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_approve_before_start_is_a_no_op() {
    let mock = Arc::new(MockProvider::new());
    let pipeline = fixtures::pipeline(mock.clone());

    let result = pipeline.approve().await;
    assert!(matches!(result, Err(PipelineError::InvalidPhase { .. })));
    assert_eq!(pipeline.status().phase, GenerationPhase::Idle);
    assert!(pipeline.results().plan.is_none());
    assert!(mock.text_calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_commands_while_busy_are_rejected() {
    let mock = Arc::new(MockProvider::new());
    mock.set_latency(Duration::from_secs(2)).await;
    let pipeline = fixtures::pipeline(mock.clone());

    let handle = pipeline
        .dispatch(Command::Start(Box::new(params(1, 0))))
        .unwrap();

    let again = pipeline.dispatch(Command::Start(Box::new(params(1, 0))));
    assert!(matches!(again, Err(PipelineError::Busy)));
    let approve = pipeline.dispatch(Command::Approve);
    assert!(matches!(approve, Err(PipelineError::Busy)));

    handle.await.unwrap().unwrap();
    let status = pipeline.status();
    assert_eq!(status.phase, GenerationPhase::ReviewIdentity);
    assert!(!status.busy);
    // Only one brief was requested.
    assert_eq!(mock.text_calls().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_late_results() {
    let mock = Arc::new(MockProvider::new());
    let pipeline = reviewed(&mock, params(1, 1)).await;
    mock.set_latency(Duration::from_secs(5)).await;

    let handle = pipeline.dispatch(Command::Approve).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(pipeline.status().phase, GenerationPhase::CampaignProduction);

    pipeline.reset();
    assert_eq!(pipeline.status().phase, GenerationPhase::Idle);

    // The abandoned job finishes quietly.
    handle.await.unwrap().unwrap();

    let status = pipeline.status();
    assert_eq!(status.phase, GenerationPhase::Idle);
    assert!(status.run_id.is_none());
    assert!(status.logs.is_empty());
    assert!(!status.busy);

    let results = pipeline.results();
    assert!(results.run_id.is_none());
    assert!(results.plan.is_none());
    assert!(results.wardrobe.is_empty());

    // A new run can start right away.
    mock.set_latency(Duration::ZERO).await;
    pipeline.start(params(1, 0)).await.unwrap();
    assert_eq!(pipeline.status().phase, GenerationPhase::ReviewIdentity);
}

#[tokio::test(start_paused = true)]
async fn test_identity_failure_keeps_parameters() {
    let mock = Arc::new(MockProvider::new());
    mock.fail_capability(
        Capability::Image,
        ProviderError::Api {
            status: 401,
            message: "API key not valid".to_string(),
        },
    )
    .await;
    let pipeline = fixtures::pipeline(mock.clone());

    let result = pipeline.start(params(1, 0)).await;
    assert!(matches!(result, Err(PipelineError::Generation(_))));

    let status = pipeline.status();
    assert_eq!(status.phase, GenerationPhase::Failed);
    assert!(status.current_error.is_some());
    assert_eq!(status.credential_alert, Some(CredentialAlert::Reconfigure));
    assert!(status.logs.iter().any(|l| l.level == LogLevel::Error));
    assert!(!status.busy);
    assert_eq!(
        pipeline.results().params().map(|p| p.age),
        Some(fixtures::persona_parameters().age)
    );

    // Retry with the captured parameters once the key is fixed.
    mock.clear_failures().await;
    pipeline.regenerate_identity().await.unwrap();
    let status = pipeline.status();
    assert_eq!(status.phase, GenerationPhase::ReviewIdentity);
    assert!(status.current_error.is_none());
    assert!(status.credential_alert.is_none());
    assert_eq!(pipeline.results().wardrobe.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_plan_failure_fails_run() {
    let mock = Arc::new(MockProvider::new());
    let pipeline = reviewed(&mock, params(1, 1)).await;
    mock.set_text_response("content_plan", "[]").await;

    assert_err!(pipeline.approve().await);

    let status = pipeline.status();
    assert_eq!(status.phase, GenerationPhase::Failed);
    assert!(status.current_error.is_some());
    assert!(pipeline.results().params().is_some());
    assert!(pipeline.results().anchor().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_quota_mid_batch_isolates_item() {
    let mock = Arc::new(MockProvider::new());
    let pipeline = reviewed(&mock, params(1, 1)).await;

    // Primary and secondary image model both out of quota for the first
    // item only.
    mock.push_failure(Capability::Image, quota_error()).await;
    mock.push_failure(Capability::Image, quota_error()).await;

    assert_ok!(pipeline.approve().await);

    let status = pipeline.status();
    assert_eq!(status.phase, GenerationPhase::Complete);
    assert_eq!(status.credential_alert, Some(CredentialAlert::ReplaceKey));
    assert!(status.current_error.is_none());

    let week = pipeline.results().plan().unwrap().week(0).unwrap();
    assert_eq!(week.items[0].status, ItemStatus::Failed);
    assert!(week.items[0].asset.is_none());
    assert_eq!(week.items[1].status, ItemStatus::Ready);
    assert_eq!(week.items[2].status, ItemStatus::Ready);

    // The failed item can be produced again.
    pipeline.regenerate_item(0, 0).await.unwrap();
    let week = pipeline.results().plan().unwrap().week(0).unwrap();
    assert_eq!(week.items[0].status, ItemStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_video_failure_falls_back_to_slideshow() {
    let mock = Arc::new(MockProvider::new());
    let pipeline = reviewed(&mock, params(1, 1)).await;
    mock.fail_capability(
        Capability::Video,
        ProviderError::Api {
            status: 500,
            message: "Internal error".to_string(),
        },
    )
    .await;

    pipeline.approve().await.unwrap();

    let week = pipeline.results().plan().unwrap().week(0).unwrap();
    let reel = &week.items[1];
    assert_eq!(reel.status, ItemStatus::Ready);
    let asset = reel.asset.as_ref().unwrap();
    assert_eq!(asset.kind, AssetKind::Slideshow);
    assert_eq!(asset.slides.len(), 3);
    assert!(asset.narration.is_some());
    assert!(pipeline
        .status()
        .logs
        .iter()
        .any(|l| l.level == LogLevel::Warning && l.message.contains("slideshow")));
}

#[tokio::test(start_paused = true)]
async fn test_batch_respects_concurrency_and_progress() {
    let mock = Arc::new(MockProvider::new());
    let config = PipelineConfig {
        batch_concurrency: 2,
        ..fixtures::pipeline_config()
    };
    let pipeline = fixtures::pipeline_with_config(mock.clone(), config);
    pipeline.start(params(2, 2)).await.unwrap();
    mock.set_latency(Duration::from_millis(200)).await;

    let mut rx = pipeline.subscribe_status();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            seen.push((status.phase, status.progress));
            if status.phase == GenerationPhase::Complete && !status.busy {
                break;
            }
        }
        seen
    });

    pipeline.approve().await.unwrap();
    let seen = collector.await.unwrap();

    assert!(mock.peak_concurrency() <= 2);
    let pool = pipeline.executor_status();
    assert_eq!(pool.total_processed, 6);
    assert_eq!(pool.active_jobs, 0);

    let production: Vec<u8> = seen
        .iter()
        .filter(|(phase, _)| *phase == GenerationPhase::CampaignProduction)
        .map(|(_, progress)| *progress)
        .collect();
    assert!(!production.is_empty());
    assert!(production.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().map(|(_, p)| *p), Some(100));
}
