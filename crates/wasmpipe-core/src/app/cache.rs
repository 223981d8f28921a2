//! PipelineCache - 論理名ごとの PipelineHandle のキャッシュ
//!
//! # 学習ポイント
//! - プロセス全体のグローバル変数ではなく、呼び出し側が所有するキャッシュ
//! - 名前ごとの `tokio::sync::OnceCell` で初回ロードを 1 回に限定
//! - 初回以降は読み取りのみ（並行読み取りは安全）

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

use crate::domain::PipelineError;
use crate::ports::{PipelineBackend, PipelineHandle};

type Slot = Arc<OnceCell<Arc<PipelineHandle>>>;

#[derive(Default)]
pub struct PipelineCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(name.to_string()).or_default().clone()
    }

    /// Return the cached handle for `name`, loading it through `backend` the
    /// first time. Concurrent first callers wait for the single load.
    ///
    /// A failed load leaves the slot empty, so a later independent call
    /// tries again.
    pub async fn get_or_resolve(
        &self,
        name: &str,
        backend: &dyn PipelineBackend,
    ) -> Result<Arc<PipelineHandle>, PipelineError> {
        let slot = self.slot(name);
        slot.get_or_try_init(|| async {
            tracing::info!(pipeline = name, backend = backend.kind(), "loading pipeline artifact");
            backend.resolve(name).await.map(Arc::new)
        })
        .await
        .cloned()
    }

    pub fn is_cached(&self, name: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(name).is_some_and(|slot| slot.initialized())
    }

    /// Names with a loaded handle, sorted.
    pub fn cached_names(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, Invocation, RunResult};
    use crate::ports::LoadedArtifact;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// resolve 回数を数えるだけの backend
    #[derive(Default)]
    struct CountingBackend {
        resolves: AtomicUsize,
    }

    #[async_trait]
    impl PipelineBackend for CountingBackend {
        fn kind(&self) -> &'static str {
            "counting"
        }

        async fn resolve(&self, name: &str) -> Result<PipelineHandle, PipelineError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if name == "missing" {
                return Err(PipelineError::resource(name, "not packaged"));
            }
            Ok(PipelineHandle::new(name, LoadedArtifact::Executable(name.into())))
        }

        async fn invoke(
            &self,
            _handle: &PipelineHandle,
            _invocation: &Invocation,
        ) -> Result<RunResult, PipelineError> {
            Ok(RunResult::default())
        }
    }

    #[tokio::test]
    async fn resolving_twice_loads_once() {
        let backend = CountingBackend::default();
        let cache = PipelineCache::new();

        let first = cache.get_or_resolve("read-segmentation", &backend).await.unwrap();
        let second = cache.get_or_resolve("read-segmentation", &backend).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.resolves.load(Ordering::SeqCst), 1);
        assert!(cache.is_cached("read-segmentation"));
    }

    #[tokio::test]
    async fn names_are_cached_independently() {
        let backend = CountingBackend::default();
        let cache = PipelineCache::new();

        cache.get_or_resolve("write-parametric-map", &backend).await.unwrap();
        cache.get_or_resolve("read-parametric-map", &backend).await.unwrap();

        assert_eq!(backend.resolves.load(Ordering::SeqCst), 2);
        assert_eq!(
            cache.cached_names(),
            vec!["read-parametric-map".to_string(), "write-parametric-map".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_resolution_loads_once() {
        let backend = Arc::new(CountingBackend::default());
        let cache = Arc::new(PipelineCache::new());

        let mut joins = Vec::new();
        for _ in 0..8 {
            let backend = backend.clone();
            let cache = cache.clone();
            joins.push(tokio::spawn(async move {
                cache
                    .get_or_resolve("read-segmentation", backend.as_ref())
                    .await
                    .unwrap()
            }));
        }
        for join in joins {
            join.await.unwrap();
        }

        assert_eq!(backend.resolves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_resolution_is_not_cached() {
        let backend = CountingBackend::default();
        let cache = PipelineCache::new();

        let err = cache.get_or_resolve("missing", &backend).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(!cache.is_cached("missing"));

        cache.get_or_resolve("missing", &backend).await.unwrap_err();
        assert_eq!(backend.resolves.load(Ordering::SeqCst), 2);
    }
}
