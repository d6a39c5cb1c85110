//! Pipeline coordinator.
//!
//! Wires the stages through bounded queues:
//!
//! ```text
//! enumerator ─tasks─▶ fetch × W ─evidence─▶ compute × C ─results─▶ storer ─▶ sink
//! ```
//!
//! Completion propagates by channel closure: each stage's senders are
//! dropped when it returns, so the next stage drains and exits. A fatal
//! error in any stage cancels a shared token that every stage watches; the
//! first such error is returned and the namespace is not finalized.

use crate::channel;
use crate::compute::ComputeWorker;
use crate::enumerator::run_enumerator;
use crate::fetch::FetchWorker;
use crate::progress::{Progress, RunSummary};
use crate::retry::{retry, RetryPolicy};
use crate::storer::ResultStorer;
use assocrank_common::{AssocError, Result, ScoringMethod};
use assocrank_config::Config;
use assocrank_db::{RepositoryConnector, ScoreSink};
use assocrank_ranker::{Scorer, ScorerConfig};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub namespace: String,
    pub fetch_workers: usize,
    pub compute_workers: usize,
    pub queue_capacity: usize,
    pub chunk_size: usize,
    pub log_every: u64,
    pub methods: Vec<ScoringMethod>,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            namespace: config.storage.namespace.clone(),
            fetch_workers: config.pipeline.resolved_fetch_workers(),
            compute_workers: config.pipeline.resolved_compute_workers(),
            queue_capacity: config.pipeline.queue_capacity,
            chunk_size: config.storage.chunk_size,
            log_every: config.pipeline.log_every,
            methods: config.scoring.methods.clone(),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Scorer configured from the `scoring` and `registry` sections.
pub fn scorer_from_config(config: &Config) -> Scorer {
    Scorer::new(
        Arc::new(config.datasource_registry()),
        ScorerConfig {
            max_entries: config.scoring.max_entries,
            max_mode: config.scoring.max_mode,
        },
    )
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

pub struct ScoringPipeline<C: RepositoryConnector> {
    connector: Arc<C>,
    sink: Arc<dyn ScoreSink>,
    scorer: Arc<Scorer>,
    options: PipelineOptions,
    shutdown: CancellationToken,
}

impl<C: RepositoryConnector> ScoringPipeline<C> {
    pub fn new(
        connector: C,
        sink: Arc<dyn ScoreSink>,
        scorer: Scorer,
        options: PipelineOptions,
    ) -> Self {
        Self {
            connector: Arc::new(connector),
            sink,
            scorer: Arc::new(scorer),
            options,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling `token` stops a running pipeline without finalizing.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[instrument(skip(self), fields(namespace = %self.options.namespace))]
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let opts = &self.options;
        let fetch_workers = opts.fetch_workers.max(1);
        let compute_workers = opts.compute_workers.max(1);

        info!(
            %run_id,
            fetch_workers,
            compute_workers,
            queue_capacity = opts.queue_capacity,
            chunk_size = opts.chunk_size,
            "Starting scoring pipeline"
        );

        let progress = Arc::new(Progress::new(fetch_workers, compute_workers));
        let cancel = self.shutdown.child_token();
        let methods: Arc<[ScoringMethod]> = Arc::from(opts.methods.as_slice());

        let (task_tx, task_rx) = channel::bounded(opts.queue_capacity);
        let (evidence_tx, evidence_rx) = channel::bounded(opts.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(opts.queue_capacity.max(1));

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        // Storer first so the namespace clear overlaps enumeration.
        let storer = ResultStorer {
            sink: Arc::clone(&self.sink),
            namespace: opts.namespace.clone(),
            chunk_size: opts.chunk_size,
            input: result_rx,
            progress: Arc::clone(&progress),
            retry: opts.retry,
            cancel: cancel.clone(),
        };
        tasks.spawn(stage("storer", cancel.clone(), storer.run()));

        let repo = retry("connect repository", &opts.retry, &cancel, || {
            self.connector.connect()
        })
        .await
        .map_err(|e| AssocError::pipeline("enumerator", e));
        let repo = match repo {
            Ok(repo) => repo,
            Err(e) => {
                cancel.cancel();
                while tasks.join_next().await.is_some() {}
                return Err(e);
            }
        };
        tasks.spawn(stage(
            "enumerator",
            cancel.clone(),
            run_enumerator(repo, task_tx, Arc::clone(&progress), cancel.clone()),
        ));

        for worker_id in 0..fetch_workers {
            let worker = FetchWorker {
                worker_id,
                connector: Arc::clone(&self.connector),
                tasks: task_rx.clone(),
                output: evidence_tx.clone(),
                progress: Arc::clone(&progress),
                retry: opts.retry,
                log_every: opts.log_every,
                cancel: cancel.clone(),
            };
            tasks.spawn(stage("fetch", cancel.clone(), worker.run()));
        }
        drop(task_rx);
        drop(evidence_tx);

        for worker_id in 0..compute_workers {
            let worker = ComputeWorker {
                worker_id,
                scorer: Arc::clone(&self.scorer),
                methods: Arc::clone(&methods),
                input: evidence_rx.clone(),
                output: result_tx.clone(),
                progress: Arc::clone(&progress),
                log_every: opts.log_every,
                cancel: cancel.clone(),
            };
            let stage_cancel = cancel.clone();
            tasks.spawn_blocking(move || {
                worker
                    .run()
                    .map_err(|e| escalate("compute", &stage_cancel, e))
            });
        }
        drop(evidence_rx);
        drop(result_tx);

        let mut first_error: Option<AssocError> = None;
        while let Some(joined) = tasks.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(join_err) => {
                    cancel.cancel();
                    AssocError::pipeline("worker", join_err)
                }
            };
            // A stage that merely observed cancellation never masks the cause.
            let replace = match &first_error {
                None => true,
                Some(AssocError::Cancelled) => !matches!(err, AssocError::Cancelled),
                Some(_) => false,
            };
            if replace {
                first_error = Some(err);
            }
        }

        if let Some(err) = first_error {
            error!(%run_id, error = %err, "Scoring pipeline failed");
            return Err(err);
        }
        if cancel.is_cancelled() {
            warn!(%run_id, "Scoring pipeline cancelled");
            return Err(AssocError::Cancelled);
        }

        let finalized = retry("finalize namespace", &opts.retry, &cancel, || {
            self.sink.finalize(&opts.namespace)
        })
        .await
        .map_err(|e| AssocError::pipeline("storer", e))?;

        let summary = progress.summary(run_id, &opts.namespace, started_at);
        info!(
            %run_id,
            finalized,
            sparsity_ratio = summary.sparsity_ratio,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Scoring pipeline complete: {}",
            summary.headline()
        );
        Ok(summary)
    }
}

/// Cancel the run on a stage's fatal error and tag it with the stage name.
fn escalate(name: &str, cancel: &CancellationToken, err: AssocError) -> AssocError {
    match err {
        AssocError::Cancelled => AssocError::Cancelled,
        err => {
            cancel.cancel();
            AssocError::pipeline(name, err)
        }
    }
}

async fn stage<F>(name: &'static str, cancel: CancellationToken, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    fut.await.map_err(|e| escalate(name, &cancel, e))
}
