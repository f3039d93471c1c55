use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use index::{DocSet, IndexError, LshIndex};
use minhash::Shingler;
use tracing::{debug, info, warn, Level};

use crate::pool::{panic_message, PoolError, TaskHandle, TaskPool};
use crate::types::{
    MatchConfig, MatchError, MatchMap, MatchOutcome, MatchTask, ShardFailure, ShardReport,
};


/// Split `len` items into `shards` contiguous chunks of `ceil(len / shards)`.
///
/// Always returns exactly `shards` ranges; trailing ones may be short or empty.
/// Panics if `shards` is zero.
pub fn partition(len: usize, shards: usize) -> Vec<Range<usize>> {
    assert!(shards > 0, "partition needs at least one shard");
    let chunk = len.div_ceil(shards);
    (0..shards)
        .map(|shard| {
            let start = (shard * chunk).min(len);
            let end = (start + chunk).min(len);
            start..end
        })
        .collect()
}

/// Matches batches of lookup keys against a shared index, one chunk per worker.
///
/// Each run owns its result map; workers accumulate into a local map and
/// merge it under a single lock acquisition when their chunk is done.
#[derive(Clone)]
pub struct ShardedMatcher {
    index: Arc<LshIndex>,
    cfg: MatchConfig,
    shingler: Arc<dyn Shingler>,
}

impl ShardedMatcher {
    pub fn new(
        index: Arc<LshIndex>,
        cfg: MatchConfig,
        shingler: Arc<dyn Shingler>,
    ) -> Result<Self, MatchError> {
        cfg.validate()?;
        Ok(Self {
            index,
            cfg,
            shingler,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }

    pub fn index(&self) -> &Arc<LshIndex> {
        &self.index
    }

    /// Match a single task against the index.
    pub fn match_one(&self, task: &MatchTask) -> Result<DocSet, IndexError> {
        let text = task.text();
        let shingles = self.shingler.shingles(text);
        let threshold = self.cfg.thresholds.threshold_for(text);
        self.index.query(&shingles, threshold)
    }

    /// Run the batch with one scoped OS thread per shard.
    pub fn run(&self, tasks: &[MatchTask]) -> MatchOutcome {
        let start = Instant::now();
        let ranges = partition(tasks.len(), self.cfg.shards);
        let global = Mutex::new(MatchMap::new());

        let results: Vec<Result<ShardReport, MatchError>> = thread::scope(|scope| {
            let handles: Vec<_> = ranges
                .iter()
                .enumerate()
                .map(|(shard, range)| {
                    let chunk = &tasks[range.clone()];
                    let global = &global;
                    scope.spawn(move || self.run_shard(shard, chunk, global))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|payload| {
                        Err(MatchError::Pool(PoolError::TaskPanicked(panic_message(
                            &*payload,
                        ))))
                    })
                })
                .collect()
        });

        let matches = global.into_inner().unwrap_or_else(PoisonError::into_inner);
        self.finish(matches, results, tasks.len(), start)
    }

    /// Run the batch as one job per shard on `pool`.
    ///
    /// Fails only if the pool refuses a submission; shard failures are
    /// reported in the outcome.
    pub fn run_on(
        &self,
        pool: &TaskPool,
        tasks: Vec<MatchTask>,
    ) -> Result<MatchOutcome, MatchError> {
        let start = Instant::now();
        let total = tasks.len();
        let ranges = partition(total, self.cfg.shards);
        let tasks = Arc::new(tasks);
        let global = Arc::new(Mutex::new(MatchMap::new()));

        let handles: Vec<TaskHandle<Result<ShardReport, MatchError>>> = ranges
            .into_iter()
            .enumerate()
            .map(|(shard, range)| {
                let matcher = self.clone();
                let tasks = Arc::clone(&tasks);
                let global = Arc::clone(&global);
                pool.submit(move || matcher.run_shard(shard, &tasks[range], &global))
            })
            .collect::<Result<_, _>>()?;

        let results = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|err| Err(MatchError::Pool(err))))
            .collect();

        let matches = std::mem::take(&mut *global.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(self.finish(matches, results, total, start))
    }

    fn run_shard(
        &self,
        shard: usize,
        chunk: &[MatchTask],
        global: &Mutex<MatchMap>,
    ) -> Result<ShardReport, MatchError> {
        let span = tracing::span!(Level::INFO, "matcher.shard", shard, tasks = chunk.len());
        let _guard = span.enter();
        let start = Instant::now();

        let mut local = MatchMap::new();
        let mut matched = 0;
        for (done, task) in chunk.iter().enumerate() {
            let hits = self.match_one(task)?;
            if !hits.is_empty() {
                matched += 1;
            }
            local.entry(task.key.clone()).or_default().extend(hits);

            let every = self.cfg.progress_every;
            if every > 0 && (done + 1) % every == 0 {
                debug!(shard, done = done + 1, total = chunk.len(), "shard_progress");
            }
        }

        {
            let mut merged = global.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, hits) in local {
                merged.entry(key).or_default().extend(hits);
            }
        }

        let elapsed = start.elapsed();
        info!(
            shard,
            tasks = chunk.len(),
            matched,
            elapsed_micros = elapsed.as_micros(),
            "shard_finished"
        );
        Ok(ShardReport {
            shard,
            tasks: chunk.len(),
            matched,
            elapsed,
        })
    }

    fn finish(
        &self,
        matches: MatchMap,
        results: Vec<Result<ShardReport, MatchError>>,
        total: usize,
        start: Instant,
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome {
            matches,
            ..MatchOutcome::default()
        };
        for (shard, result) in results.into_iter().enumerate() {
            match result {
                Ok(report) => outcome.reports.push(report),
                Err(error) => {
                    warn!(shard, error = %error, "shard_failed");
                    outcome.failures.push(ShardFailure { shard, error });
                }
            }
        }
        info!(
            tasks = total,
            shards = self.cfg.shards,
            keys = outcome.matches.len(),
            failed_shards = outcome.failures.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "match_run_finished"
        );
        outcome
    }
}
