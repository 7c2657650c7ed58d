//! Pass evaluation, inline or fork-join on a worker pool
//!
//! Every item of a pass writes only its own slot and reads only passes that
//! finished before it, so a pass splits into independent chunks. The pool
//! joins all chunks before the next pass starts.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::TransformCacheConfig;
use crate::render::error::CacheError;

/// Stage of an update, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStage {
    /// Idle between updates
    Throttle,
    /// Camera projections, node transforms, light and target parameters
    ComputePass1,
    /// Branch compositions
    ComputeBranch,
    /// Path compositions
    ComputePath,
    /// Composites and visibility tests
    ComputePass45,
}

impl UpdateStage {
    /// Stages that do work, in execution order
    pub const COMPUTE: [UpdateStage; 4] = [
        Self::ComputePass1,
        Self::ComputeBranch,
        Self::ComputePath,
        Self::ComputePass45,
    ];

    fn index(self) -> usize {
        match self {
            Self::Throttle => 0,
            Self::ComputePass1 => 1,
            Self::ComputeBranch => 2,
            Self::ComputePath => 3,
            Self::ComputePass45 => 4,
        }
    }
}

/// Work done by one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageStats {
    /// Live items visited
    pub items: usize,
    /// Items that were stale and recomputed
    pub recomputed: usize,
    /// Whether the stage ran on the worker pool
    pub parallel: bool,
}

impl std::ops::AddAssign for StageStats {
    fn add_assign(&mut self, other: Self) {
        self.items += other.items;
        self.recomputed += other.recomputed;
        self.parallel |= other.parallel;
    }
}

/// Per-stage statistics of the last update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateStats {
    stages: [StageStats; 5],
}

impl UpdateStats {
    /// Statistics of one stage; `Throttle` never does work
    pub fn stage(&self, stage: UpdateStage) -> StageStats {
        self.stages[stage.index()]
    }

    /// Total items recomputed across all stages
    pub fn recomputed(&self) -> usize {
        self.stages.iter().map(|s| s.recomputed).sum()
    }

    pub(crate) fn record(&mut self, stage: UpdateStage, stats: StageStats) {
        self.stages[stage.index()] += stats;
    }
}

/// Runs passes according to the cache configuration
#[derive(Debug)]
pub(crate) struct PassRunner {
    pool: Option<ThreadPool>,
    chunk_size: usize,
    parallel_threshold: usize,
}

impl PassRunner {
    /// Runner that evaluates every pass on the calling thread
    pub(crate) fn inline() -> Self {
        let defaults = TransformCacheConfig::default();
        Self {
            pool: None,
            chunk_size: defaults.chunk_size,
            parallel_threshold: defaults.parallel_threshold,
        }
    }

    pub(crate) fn new(config: &TransformCacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let pool = if config.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("transform-cache-{i}"))
                .build()
                .map_err(|e| CacheError::ThreadPool(e.to_string()))?;
            log::debug!("Transform cache worker pool started with {} threads", config.worker_threads);
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            pool,
            chunk_size: config.chunk_size,
            parallel_threshold: config.parallel_threshold,
        })
    }

    /// Refresh every item with `refresh`, which reports whether it recomputed
    pub(crate) fn run<T, F>(&self, items: &mut [T], refresh: F) -> StageStats
    where
        T: Send,
        F: Fn(&mut T) -> bool + Sync,
    {
        let len = items.len();
        let count = |chunk: &mut [T]| -> usize {
            chunk.iter_mut().map(|item| usize::from(refresh(item))).sum()
        };

        match &self.pool {
            Some(pool) if len >= self.parallel_threshold => {
                let chunk_size = self.chunk_size;
                let recomputed = pool.install(|| {
                    items.par_chunks_mut(chunk_size).map(|chunk| count(chunk)).sum::<usize>()
                });
                StageStats { items: len, recomputed, parallel: true }
            }
            _ => {
                let recomputed = count(items);
                StageStats { items: len, recomputed, parallel: false }
            }
        }
    }
}
