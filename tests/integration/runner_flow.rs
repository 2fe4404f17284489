use crate::helpers::FlakyModel;
use daily_scholar::config::RunnerConfig;
use daily_scholar::progress::FnStage;
use daily_scholar::render::Renderer;
use daily_scholar::scholar_dirs::StoragePaths;
use daily_scholar::{
    ArtifactCache, CacheKey, CacheNamespace, ModelClient, Pipeline, Pipelines, ProgressEvent,
    ProgressTaskRunner, ResearchProfileStore, ScholarError,
};
use futures_util::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn step(name: &'static str) -> FnStage {
    FnStage::new(name, move |input, progress| async move {
        progress.report(format!("{name} running")).await;
        let mut trail = input.as_array().cloned().unwrap_or_default();
        trail.push(json!(name));
        Ok(Value::Array(trail))
    })
}

#[tokio::test]
async fn stream_ends_with_exactly_one_terminal_event() {
    let runner = ProgressTaskRunner::new(&RunnerConfig::default(), None);
    let pipeline = Pipeline::new("steps", json!([]))
        .stage(step("fetch"))
        .stage(step("summarize"))
        .stage(step("render"));

    let events: Vec<ProgressEvent> = runner.run(pipeline).collect().await;

    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(events.last().unwrap().is_terminal());
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Complete {
            result: json!(["fetch", "summarize", "render"])
        })
    );
    assert_eq!(events[0], ProgressEvent::progress("fetch running"));
}

#[tokio::test]
async fn failing_stage_stops_the_pipeline() {
    let runner = ProgressTaskRunner::new(&RunnerConfig::default(), None);
    let reached = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&reached);

    let pipeline = Pipeline::new("failing", json!([]))
        .stage(step("fetch"))
        .stage(FnStage::new("summarize", |_input, _progress| async {
            Err(ScholarError::Model("quota exceeded".into()))
        }))
        .stage(FnStage::new("render", move |input, _progress| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(input)
            }
        }));

    let terminal = runner.run_with(pipeline, |_| {}).await;

    assert!(matches!(terminal, ProgressEvent::Error { ref message } if message.contains("quota exceeded")));
    assert!(!reached.load(Ordering::SeqCst));
}

#[test]
fn cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArtifactCache::new(dir.path());
    let key = CacheKey::for_url("https://arxiv.org/pdf/2401.00001");

    assert!(cache.get(CacheNamespace::Posters, &key).is_none());

    let artifact = json!({"a": 1}).as_object().cloned().unwrap();
    cache.put(CacheNamespace::Posters, &key, &artifact);
    assert_eq!(cache.get(CacheNamespace::Posters, &key), Some(artifact));
}

#[tokio::test]
async fn second_poster_request_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StoragePaths::rooted_at(dir.path());
    let model: Arc<dyn ModelClient> = Arc::new(FlakyModel::default());
    let pipelines = Pipelines::new(
        model,
        Arc::new(Renderer::new().unwrap()),
        ResearchProfileStore::new(paths.profile_file()),
        &paths,
    );
    let runner = ProgressTaskRunner::new(
        &RunnerConfig::default(),
        Some(ArtifactCache::new(paths.artifact_cache_dir())),
    );
    let url = "https://arxiv.org/pdf/2401.00001";

    let first: Vec<ProgressEvent> = runner.run(pipelines.poster(url)).collect().await;
    let second: Vec<ProgressEvent> = runner.run(pipelines.poster(url)).collect().await;

    assert_eq!(first[0], ProgressEvent::progress("Reading and summarizing paper..."));
    assert_eq!(second.len(), 2);
    assert_eq!(second[0], ProgressEvent::progress("Loaded result from cache."));
    assert_eq!(first.last(), second.last());
}
