use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prose_critique::clients::backend::{
    BackendError, CompletionRequest, CompletionResponse, CritiqueBackend,
};
use prose_critique::config::{Config, ModelConfig};
use prose_critique::error::{AppError, ErrorKind, InputError, RunError};
use prose_critique::infrastructure::{CacheStore, MemoryCache};
use prose_critique::models::{RunState, Stage};
use prose_critique::services::{analyze, assemble_report, generate_requirements, ReportInput};
use prose_critique::{Orchestrator, RunRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

const CRITIQUE_JSON: &str = r#"{
  "text_overview": {"genre_guess": "sketch", "tone": "quiet", "apparent_audience": "adults"},
  "structural_outline": [{"paragraph_index": 0, "intent": "setting", "summary": "A walk."}],
  "local_issues": [{
    "paragraph_index": 0,
    "sentence": "It lasted all night.",
    "issue_type": "clarity",
    "severity": "moderate",
    "description": "Unclear pronoun.",
    "suggestion": "Name the subject."
  }],
  "quality_scores": {"clarity": 6, "conciseness": 7, "vividness": 5, "originality": 4,
                     "coherence": 7, "engagement": 5, "overall": 6},
  "strengths": ["Economy of words"],
  "summary": "A short, quiet sketch."
}"#;

const AUDIT_JSON: &str = r#"{
  "audit_verdict": "mostly_agree",
  "confidence_score": 0.8,
  "missed_issues": [{"description": "Flat rhythm", "evidence": "It lasted all night.", "severity": "minor"}],
  "summary": "Solid critique."
}"#;

const TEXT: &str = "The storm broke over the hills. It lasted all night.";

#[derive(Clone)]
enum Reply {
    Json(&'static str),
    Transport,
    Hang(Duration),
}

/// 阻塞主分析调用，直到测试放行
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

/// 按模型名路由的假后端
struct FakeBackend {
    primary: Reply,
    audit: Reply,
    gate: Option<Arc<Gate>>,
    calls: AtomicUsize,
}

impl FakeBackend {
    fn new(primary: Reply, audit: Reply) -> Arc<Self> {
        Arc::new(Self {
            primary,
            audit,
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn gated(gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self {
            primary: Reply::Json(CRITIQUE_JSON),
            audit: Reply::Json(AUDIT_JSON),
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CritiqueBackend for FakeBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let is_primary = request.model == "primary-test";
        if is_primary {
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
        let reply = if is_primary {
            self.primary.clone()
        } else {
            self.audit.clone()
        };
        match reply {
            Reply::Json(body) => Ok(CompletionResponse {
                content: body.to_string(),
                input_tokens: Some(100),
                output_tokens: Some(50),
            }),
            Reply::Transport => Err(BackendError::Transport("connection reset".into())),
            Reply::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(CompletionResponse::text(CRITIQUE_JSON))
            }
        }
    }
}

fn test_config() -> Config {
    Config {
        runs_dir: None,
        enable_cache: false,
        primary: ModelConfig {
            model: "primary-test".into(),
            retries: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
            timeout_ms: 2_000,
            ..ModelConfig::default()
        },
        audit: ModelConfig {
            model: "audit-test".into(),
            retries: 0,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
            timeout_ms: 2_000,
            ..ModelConfig::audit_default()
        },
        ..Config::default()
    }
}

fn orchestrator(config: Config, backend: Arc<FakeBackend>) -> Orchestrator {
    Orchestrator::with_cache(config, backend, RunRegistry::new(), None)
}

#[tokio::test]
async fn test_full_run_completes() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let orch = orchestrator(test_config(), backend.clone());

    let id = assert_ok!(orch.submit(TEXT, None, None).await);
    let status = assert_ok!(orch.wait(&id).await);
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(status.progress, 1.0);
    assert_eq!(backend.calls(), 2);

    let output = assert_ok!(orch.fetch(&id).await);
    let doc = &output.narrative_document;
    assert!(doc.contains("A short, quiet sketch."));
    assert!(doc.contains("- Verdict: mostly_agree"));
    assert!(doc.contains(TEXT));
    assert!(doc.contains("=== SYSTEM PROMPT ==="));

    let structured = &output.structured_document;
    assert_eq!(structured["metadata"]["run_id"], id.as_str());
    assert_eq!(structured["metadata"]["llm_calls"].as_array().unwrap().len(), 2);
    assert_eq!(structured["audit"]["audit_verdict"], "mostly_agree");
    assert_eq!(structured["requirements"]["origin"], "generated");
}

#[tokio::test]
async fn test_supplied_requirements_are_used() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let orch = orchestrator(test_config(), backend);

    let id = assert_ok!(orch.submit(TEXT, Some("Judge the imagery.\n\nJudge the pacing."), None).await);
    orch.wait(&id).await.unwrap();
    let output = assert_ok!(orch.fetch(&id).await);
    let requirements = &output.structured_document["requirements"];
    assert_eq!(requirements["origin"], "supplied");
    assert_eq!(requirements["criteria"].as_array().unwrap().len(), 2);
    assert!(output.narrative_document.contains("AUTHOR REQUIREMENTS"));
}

#[tokio::test]
async fn test_input_validation() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let orch = orchestrator(test_config(), backend.clone());

    let long_text = "a".repeat(9000);
    let err = assert_err!(orch.submit(&long_text, None, None).await);
    assert!(matches!(
        err,
        AppError::Input(InputError::TooLong {
            max: 8192,
            actual: 9000
        })
    ));
    assert_eq!(err.kind(), ErrorKind::InputError);

    let err = assert_err!(orch.submit("   \n\t ", None, None).await);
    assert!(matches!(err, AppError::Input(InputError::Empty)));

    assert!(orch.registry().is_empty().await);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let orch = orchestrator(test_config(), backend);

    let err = assert_err!(orch.poll("nope").await);
    assert!(matches!(err, AppError::Run(RunError::NotFound { .. })));
    let err = assert_err!(orch.fetch("nope").await);
    assert!(matches!(err, AppError::Run(RunError::NotFound { .. })));
    assert_err!(orch.cancel("nope").await);
}

#[tokio::test]
async fn test_cyrillic_scenario() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let orch = orchestrator(test_config(), backend);

    let id = assert_ok!(orch.submit("Он шёл по улице. Он остановился.", None, None).await);
    let status = orch.wait(&id).await.unwrap();
    assert_eq!(status.state, RunState::Completed);

    let output = orch.fetch(&id).await.unwrap();
    let analysis = &output.structured_document["analysis"];
    assert_eq!(analysis["language"], "ru");
    assert_eq!(analysis["paragraph_count"], 1);
    assert_eq!(analysis["sentence_count"], 2);
    assert_eq!(analysis["word_count"], 6);
    assert_eq!(analysis["coreference_flags"].as_array().unwrap().len(), 2);
    assert_eq!(output.structured_document["metadata"]["language"], "ru");
    assert!(output.narrative_document.contains("## Обзор"));
    assert!(output.narrative_document.contains("=== СИСТЕМНЫЙ ПРОМПТ ==="));
}

#[tokio::test]
async fn test_all_timeouts_fail_the_run() {
    let backend = FakeBackend::new(
        Reply::Hang(Duration::from_secs(2)),
        Reply::Json(AUDIT_JSON),
    );
    let mut config = test_config();
    config.primary.timeout_ms = 50;
    let orch = orchestrator(config, backend.clone());

    let id = orch.submit(TEXT, None, None).await.unwrap();
    let status = orch.wait(&id).await.unwrap();
    match &status.state {
        RunState::Error { kind, .. } => assert_eq!(*kind, ErrorKind::RemoteCallFailure),
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(status.error.as_ref().map(|e| e.0), Some(ErrorKind::RemoteCallFailure));
    assert_eq!(backend.calls(), 2);

    let err = assert_err!(orch.fetch(&id).await);
    assert!(matches!(
        err,
        AppError::Run(RunError::Failed {
            kind: ErrorKind::RemoteCallFailure,
            ..
        })
    ));

    let handle = orch.registry().get(&id).await.unwrap();
    let run = handle.run.lock().await;
    assert!(run.critique.is_none());
    assert!(run.audit.is_none());
    assert!(run.output.is_none());
    assert_eq!(run.llm_calls.len(), 2);
    assert!(run.llm_calls.iter().all(|c| c.error.is_some()));
}

#[tokio::test]
async fn test_audit_failure_degrades() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Transport);
    let orch = orchestrator(test_config(), backend);

    let id = orch.submit(TEXT, None, None).await.unwrap();
    let status = orch.wait(&id).await.unwrap();
    assert_eq!(status.state, RunState::Completed);

    let output = orch.fetch(&id).await.unwrap();
    assert!(output.narrative_document.contains("Audit unavailable"));
    assert!(output.structured_document["audit"].is_null());
    let note = output.structured_document["audit_note"].as_str().unwrap();
    assert!(note.starts_with("audit_failure"));
}

#[tokio::test]
async fn test_audit_disabled() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let mut config = test_config();
    config.enable_audit = false;
    let orch = orchestrator(config, backend.clone());

    let id = orch.submit(TEXT, None, None).await.unwrap();
    orch.wait(&id).await.unwrap();
    let output = orch.fetch(&id).await.unwrap();
    assert_eq!(backend.calls(), 1);
    assert!(output.narrative_document.contains("Audit unavailable."));
    assert_eq!(
        output.structured_document["audit_note"],
        "Audit disabled by configuration."
    );
}

#[tokio::test]
async fn test_cancel_during_primary_critique() {
    let gate = Arc::new(Gate::default());
    let backend = FakeBackend::gated(gate.clone());
    let orch = orchestrator(test_config(), backend.clone());

    let id = orch.submit(TEXT, None, None).await.unwrap();
    gate.entered.notified().await;

    let status = orch.poll(&id).await.unwrap();
    assert_eq!(status.stage, Some(Stage::PrimaryCritique));
    {
        // 预分析和评判标准在主分析开始前已写入 Run
        let handle = orch.registry().get(&id).await.unwrap();
        let run = handle.run.lock().await;
        assert!(run.analysis.is_some());
        assert!(run.requirements.is_some());
    }
    assert_ok!(orch.cancel(&id).await);
    gate.release.notify_one();

    let status = orch.wait(&id).await.unwrap();
    assert_eq!(status.state, RunState::Cancelled);
    let err = assert_err!(orch.fetch(&id).await);
    assert!(matches!(err, AppError::Run(RunError::Cancelled { .. })));

    // 取消后返回的主分析结果被丢弃，审核不再执行
    assert_eq!(backend.calls(), 1);
    let handle = orch.registry().get(&id).await.unwrap();
    let run = handle.run.lock().await;
    assert!(run.critique.is_none());
    assert!(run.output.is_none());

    // 已结束的 Run 再次取消是空操作
    drop(run);
    assert_ok!(orch.cancel(&id).await);
    assert_eq!(orch.poll(&id).await.unwrap().state, RunState::Cancelled);
}

#[tokio::test]
async fn test_pending_run_waits_for_permit_and_can_be_cancelled() {
    let gate = Arc::new(Gate::default());
    let backend = FakeBackend::gated(gate.clone());
    let mut config = test_config();
    config.max_concurrent_runs = 1;
    let orch = orchestrator(config, backend);

    let first = orch.submit(TEXT, None, None).await.unwrap();
    gate.entered.notified().await;
    let second = orch.submit(TEXT, None, None).await.unwrap();

    assert_eq!(orch.poll(&second).await.unwrap().state, RunState::Pending);
    orch.cancel(&second).await.unwrap();
    let status = orch.wait(&second).await.unwrap();
    assert_eq!(status.state, RunState::Cancelled);

    gate.release.notify_one();
    let status = orch.wait(&first).await.unwrap();
    assert_eq!(status.state, RunState::Completed);
}

#[tokio::test]
async fn test_cache_round_trip_skips_backend() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let cache = Arc::new(MemoryCache::new());
    let mut config = test_config();
    config.enable_cache = true;
    let orch = Orchestrator::with_cache(
        config,
        backend.clone(),
        RunRegistry::new(),
        Some(cache.clone() as Arc<dyn CacheStore>),
    );

    let first = orch.submit(TEXT, None, None).await.unwrap();
    orch.wait(&first).await.unwrap();
    assert_eq!(backend.calls(), 2);
    assert_eq!(cache.len(), 2);

    let second = orch.submit(TEXT, None, None).await.unwrap();
    let status = orch.wait(&second).await.unwrap();
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(backend.calls(), 2);

    let output = orch.fetch(&second).await.unwrap();
    let calls = output.structured_document["metadata"]["llm_calls"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c["cached"] == true && c["attempt"] == 0));
}

#[tokio::test]
async fn test_reassembly_is_byte_identical() {
    let backend = FakeBackend::new(Reply::Json(CRITIQUE_JSON), Reply::Json(AUDIT_JSON));
    let orch = orchestrator(test_config(), backend);

    let id = orch.submit(TEXT, None, None).await.unwrap();
    orch.wait(&id).await.unwrap();
    let output = orch.fetch(&id).await.unwrap();

    let finished_at: DateTime<Utc> = DateTime::parse_from_rfc3339(
        output.structured_document["metadata"]["completed_at"]
            .as_str()
            .unwrap(),
    )
    .unwrap()
    .with_timezone(&Utc);

    let handle = orch.registry().get(&id).await.unwrap();
    let run = handle.run.lock().await;
    let again = assemble_report(&ReportInput {
        run_id: &run.id,
        input_hash: &run.input_hash,
        input_text: &run.input_text,
        analysis: run.analysis.as_ref().unwrap(),
        requirements: run.requirements.as_ref().unwrap(),
        critique: run.critique.as_ref().unwrap(),
        audit: run.audit.as_ref(),
        audit_note: run.audit_note.as_deref(),
        primary_prompt: run.primary_prompt.as_deref().unwrap(),
        llm_calls: &run.llm_calls,
        created_at: run.created_at,
        finished_at,
        max_report_chars: run.config.max_report_chars,
    });
    assert_eq!(again.narrative_document, output.narrative_document);
    assert_eq!(
        serde_json::to_string(&again.structured_document).unwrap(),
        serde_json::to_string(&output.structured_document).unwrap()
    );
}

#[tokio::test]
async fn test_purge() {
    let gate = Arc::new(Gate::default());
    let backend = FakeBackend::gated(gate.clone());
    let orch = orchestrator(test_config(), backend);

    let id = orch.submit(TEXT, None, None).await.unwrap();
    gate.entered.notified().await;
    let err = assert_err!(orch.purge(&id).await);
    assert!(matches!(err, AppError::Run(RunError::StillActive { .. })));

    gate.release.notify_one();
    orch.wait(&id).await.unwrap();
    assert_ok!(orch.purge(&id).await);
    assert!(matches!(
        orch.poll(&id).await,
        Err(AppError::Run(RunError::NotFound { .. }))
    ));
}

#[test]
fn test_auto_requirements_are_deterministic_and_bounded() {
    let texts = [
        TEXT,
        "Once upon a time a dragon and a wizard lived in an enchanted castle. The princess laughed.",
        "“Hello,” she said. “Hello,” he said.\n\n— Ты здесь? — спросил он.",
    ];
    for text in texts {
        let analysis = analyze(text, &Config::default().heuristics);
        let first = generate_requirements(&analysis, text);
        let second = generate_requirements(&analysis, text);
        assert_eq!(first, second);
        assert!((15..=28).contains(&first.len()));
        assert!(first.criteria[0].starts_with("Comprehensibility:")
            || first.criteria[0].starts_with("Понятность:"));
    }
}
