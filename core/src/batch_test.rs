use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ErrorKind;
use crate::extract::{ChatModel, ExtractionMode};
use crate::registry::{ChatModelLoader, ModelRegistry, ModelSpec, TranscriberLoader};
use crate::transcribe::Transcriber;
use crate::{PipelineError, PipelineRunner};

struct EchoTranscriber;

impl Transcriber for EchoTranscriber {
    fn transcribe(&mut self, _audio: &[f32], _sample_rate: u32) -> anyhow::Result<String> {
        Ok("Dow Jones closing down 58 points at 34,020.".to_string())
    }
}

struct CountingLoader {
    loads: Arc<AtomicUsize>,
}

#[async_trait]
impl TranscriberLoader for CountingLoader {
    async fn load(&self, _spec: &ModelSpec) -> Result<Box<dyn Transcriber>, PipelineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(EchoTranscriber))
    }
}

struct UnusedChatLoader;

#[async_trait]
impl ChatModelLoader for UnusedChatLoader {
    async fn load(&self, _spec: &ModelSpec) -> Result<Arc<dyn ChatModel>, PipelineError> {
        Err(PipelineError::ModelUnavailable("not wired".to_string()))
    }
}

fn orchestrator(loads: &Arc<AtomicUsize>) -> BatchOrchestrator {
    let registry = Arc::new(ModelRegistry::with_loaders(
        Box::new(CountingLoader {
            loads: Arc::clone(loads),
        }),
        Box::new(UnusedChatLoader),
    ));
    BatchOrchestrator::new(PipelineRunner::new(registry, Config::default()))
}

fn request() -> ExtractionRequest {
    ExtractionRequest {
        mode: ExtractionMode::Regex,
        prompt: None,
        model: None,
    }
}

fn audible() -> Vec<f32> {
    vec![0.1; 320]
}

#[tokio::test]
async fn test_mixed_batch_is_isolated_and_ordered() {
    let loads = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator(&loads);

    // The third item carries no audio and must fail alone
    let items = vec![
        BatchItem::new("a", audible()),
        BatchItem::new("b", audible()),
        BatchItem::new("c", Vec::new()),
        BatchItem::new("d", audible()),
        BatchItem::new("e", audible()),
    ];

    let result = orchestrator.run(items, &request()).await;

    assert_eq!(result.len(), 5);
    let ids: Vec<&str> = result.iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);

    let summary = result.summary();
    assert_eq!(summary.total, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert!(summary.total_time_s >= 0.0);
    assert!((summary.average_time_s - summary.total_time_s / 5.0).abs() < 1e-9);

    let failed = result.get("c").unwrap().error().expect("c must fail");
    assert_eq!(failed.kind, ErrorKind::TranscriptionFailed);
    assert!(result.get("d").unwrap().is_quote());
}

#[tokio::test]
async fn test_model_is_loaded_once_per_batch() {
    let loads = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator(&loads);

    let items = (0..4)
        .map(|i| BatchItem::new(format!("clip-{i}"), audible()))
        .collect();
    let result = orchestrator.run(items, &request()).await;

    assert_eq!(result.summary().succeeded, 4);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_batch() {
    let loads = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator(&loads);

    let result = orchestrator.run(Vec::new(), &request()).await;
    assert!(result.is_empty());
    assert_eq!(result.summary(), BatchSummary::default());
    assert_eq!(loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lookup_by_unknown_id() {
    let loads = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator(&loads);

    let result = orchestrator
        .run(vec![BatchItem::new("only", audible())], &request())
        .await;
    assert!(result.get("only").is_some());
    assert!(result.get("missing").is_none());
}

#[tokio::test]
async fn test_result_serializes_as_ordered_map() {
    let loads = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator(&loads);

    let items = vec![
        BatchItem::new("first", audible()),
        BatchItem::new("second", Vec::new()),
    ];
    let result = orchestrator.run(items, &request()).await;

    let json = serde_json::to_string(&result).unwrap();
    // Input order survives serialization
    assert!(json.find("\"first\"").unwrap() < json.find("\"second\"").unwrap());

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["first"]["index_name"], serde_json::json!("DOW"));
    assert_eq!(
        value["second"]["kind"],
        serde_json::json!("transcription_failed")
    );
}

#[tokio::test]
async fn test_per_item_deadline() {
    let loads = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator(&loads).with_item_deadline(Duration::from_secs(30));

    let result = orchestrator
        .run(vec![BatchItem::new("quick", audible())], &request())
        .await;
    assert!(result.get("quick").unwrap().is_quote());
}
