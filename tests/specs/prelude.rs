// SPDX-License-Identifier: MIT

//! Shared spec fixtures.

pub use carrel_adapters::{AdapterError, Citation, Claim, GroundingChunk, MockIndex, Synthesis};
pub use carrel_core::{FakeClock, FileState, IngestEvent, TransitionPayload};
pub use carrel_engine::{
    BreakerConfig, CheckpointMarker, CircuitBreaker, IngestPool, PoolConfig, RateLimiter,
    RateLimiterConfig, Scanner, TransitionManager, TransitionOutcome,
};
pub use carrel_store::Store;
pub use std::sync::Arc;
pub use tokio_util::sync::CancellationToken;

/// A temp corpus on disk plus an open store scanned over it.
pub struct SpecWorld {
    pub dir: tempfile::TempDir,
    pub store: Store,
    pub clock: FakeClock,
    pub mock: Arc<MockIndex>,
}

impl SpecWorld {
    /// Create `files` text files under `corpus/essays/` and scan them.
    pub fn with_files(files: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus/essays");
        std::fs::create_dir_all(&corpus).unwrap();
        for index in 0..files {
            std::fs::write(
                corpus.join(format!("{index:03}.txt")),
                format!("essay number {index}"),
            )
            .unwrap();
        }

        let store = Store::open(dir.path().join("carrel.db")).unwrap();
        let clock = FakeClock::new();
        Scanner::new(dir.path().join("corpus"))
            .scan(&store, &clock)
            .unwrap();
        Self {
            dir,
            store,
            clock,
            mock: Arc::new(MockIndex::instant()),
        }
    }

    pub fn manager(&self) -> Arc<TransitionManager<FakeClock>> {
        Arc::new(TransitionManager::new(self.store.clone(), self.clock.clone()))
    }

    pub fn pool(
        &self,
        manager: Arc<TransitionManager<FakeClock>>,
        config: PoolConfig,
    ) -> Arc<IngestPool<MockIndex, FakeClock>> {
        // The fake clock never advances, so limiter buckets never refill;
        // quotas must cover the whole scenario.
        let limiter = RateLimiter::new(
            RateLimiterConfig {
                requests_per_minute: 1_000_000,
                tokens_per_minute: 1_000_000_000,
                requests_per_day: 1_000_000,
                ..RateLimiterConfig::default()
            },
            self.clock.clone(),
        );
        Arc::new(IngestPool::new(
            self.store.clone(),
            Arc::clone(&self.mock),
            manager,
            Arc::new(limiter),
            Arc::new(CircuitBreaker::new(BreakerConfig::default(), self.clock.clone())),
            self.clock.clone(),
            config,
            CancellationToken::new(),
        ))
    }

    /// The single scanned path when the world has exactly one file.
    pub fn only_path(&self) -> String {
        let rows = self.store.list_eligible(&FileState::ALL, 2).unwrap();
        assert_eq!(rows.len(), 1, "world has more than one file");
        rows[0].path.clone()
    }

    /// Assert the §8 store invariants: legal states, non-negative versions.
    pub fn assert_invariants(&self) {
        let rows = self.store.list_eligible(&FileState::ALL, 10_000).unwrap();
        for row in rows {
            assert!(row.version >= 0, "negative version on {}", row.path);
            if row.state == FileState::Indexed {
                assert!(row.remote_file_id.is_some(), "indexed without remote id: {}", row.path);
            }
            if row.state == FileState::Failed {
                assert!(row.last_error.is_some(), "failed without error: {}", row.path);
                assert!(row.failure_stage.is_some(), "failed without stage: {}", row.path);
            }
        }
    }
}
