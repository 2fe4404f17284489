use crate::helpers::{FixedSearch, FlakyModel, FrozenClock, local, paper};
use daily_scholar::config::DigestConfig;
use daily_scholar::scheduler::record::truncate_abstract;
use daily_scholar::scheduler::{DigestStore, SchedulerHandle};
use daily_scholar::scholar_dirs::StoragePaths;
use daily_scholar::{CycleOutcome, DigestEngine, DigestScheduler, ModelClient, ResearchProfileStore};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const QUERY: &str = "retrieval augmented generation";

struct Env {
    _dir: tempfile::TempDir,
    paths: StoragePaths,
    model: Arc<FlakyModel>,
    engine: Arc<DigestEngine>,
    config: DigestConfig,
}

fn env(failing_ids: &[&str], catch_up: bool) -> Env {
    let dir = tempfile::tempdir().unwrap();
    let paths = StoragePaths::rooted_at(dir.path());
    ResearchProfileStore::new(paths.profile_file())
        .replace(vec![QUERY.into()], vec!["RAG".into()])
        .unwrap();

    let config = DigestConfig {
        hour: 8,
        minute: 0,
        catch_up,
        asset_base_url: "http://localhost/digests".into(),
        ..Default::default()
    };
    let model = Arc::new(FlakyModel {
        failing_ids: failing_ids.iter().map(|s| (*s).to_owned()).collect(),
        ..Default::default()
    });
    let search = FixedSearch::single(QUERY, vec![paper("p1"), paper("p2")]);
    let engine = Arc::new(
        DigestEngine::new(
            config.clone(),
            &paths,
            Arc::new(search),
            Arc::clone(&model) as Arc<dyn ModelClient>,
        )
        .unwrap(),
    );
    Env {
        _dir: dir,
        paths,
        model,
        engine,
        config,
    }
}

impl Env {
    fn start(&self, clock: Arc<FrozenClock>) -> SchedulerHandle {
        DigestScheduler::new(Arc::clone(&self.engine), &self.config)
            .unwrap()
            .with_clock(clock)
            .with_tick(Duration::from_millis(10))
            .start()
    }

    fn cycles(&self) -> usize {
        self.model.cycles.load(Ordering::SeqCst)
    }

    async fn wait_for_cycles(&self, n: usize) {
        for _ in 0..200 {
            if self.cycles() >= n && !self.engine.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} cycles, saw {}", self.cycles());
    }
}

#[tokio::test]
async fn failed_summary_degrades_to_truncated_abstract() {
    let env = env(&["p2"], true);
    let date = local(10, 8, 0).date();

    let outcome = env.engine.run_cycle(date).await.unwrap();
    let CycleOutcome::Completed(record) = outcome else {
        panic!("expected a completed cycle, got {outcome:?}");
    };

    assert_eq!(record.items.len(), 2);
    assert_eq!(record.items[0].summary, "generated: p1");
    assert_eq!(
        record.items[1].summary,
        truncate_abstract(&paper("p2").abstract_text)
    );
    assert!(record.items[1].summary.ends_with("..."));
    assert!(record.image_url.starts_with("http://localhost/digests/"));

    let stored = DigestStore::new(env.paths.digest_file()).load().unwrap();
    assert_eq!(stored, Some(record));
    assert!(env.paths.digest_html_file().exists());
}

#[tokio::test]
async fn catch_up_runs_at_most_once_across_restarts() {
    let env = env(&[], true);
    let clock = Arc::new(FrozenClock::new(local(10, 12, 0)));

    let first = env.start(Arc::clone(&clock));
    env.wait_for_cycles(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    first.shutdown().await;

    // Restart later the same day: today's record exists.
    clock.set(local(10, 13, 0));
    let second = env.start(Arc::clone(&clock));
    tokio::time::sleep(Duration::from_millis(100)).await;
    second.shutdown().await;

    assert_eq!(env.cycles(), 1);
    let record = DigestStore::new(env.paths.digest_file())
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(record.date, local(10, 0, 0).date());
}

#[tokio::test]
async fn missed_day_is_dropped_and_next_day_fires() {
    let env = env(&[], false);
    let clock = Arc::new(FrozenClock::new(local(10, 10, 0)));
    let handle = env.start(Arc::clone(&clock));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.cycles(), 0);

    clock.set(local(11, 8, 5));
    env.wait_for_cycles(1).await;
    handle.shutdown().await;

    let record = DigestStore::new(env.paths.digest_file())
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(record.date, local(11, 0, 0).date());
}
