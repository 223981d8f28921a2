//! ExecutorBuilder - Executor の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 設定（RuntimeConfig）からの backend 選択
//!
//! # Fail-fast 設計
//! - `expect_pipelines()` / `expect_catalog()` で必要な pipeline を宣言
//! - `build()` 時にすべてを解決・ロードし、PipelineCache を温めておく
//! - 1 つでも解決できなければ `BuildError::MissingPipelines`

use std::sync::Arc;

use crate::app::Executor;
use crate::config::{BackendKind, ConfigError, RuntimeConfig};
use crate::impls::{DirectoryResolver, ProcessBackend, WorkerBackend};
use crate::ports::{Clock, IdGenerator, ModuleLoader, PipelineBackend, SystemClock, UlidGenerator};
use crate::typed::OperationCatalog;

/// ExecutorBuilder は Executor を構築
///
/// # 使用例
/// ```ignore
/// let executor = ExecutorBuilder::from_env()?
///     .expect_catalog(&dicom_catalog()?)
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct ExecutorBuilder {
    config: RuntimeConfig,
    backend: Option<Arc<dyn PipelineBackend>>,
    module_loader: Option<Arc<dyn ModuleLoader>>,
    ids: Option<Arc<dyn IdGenerator>>,
    clock: Option<Arc<dyn Clock>>,
    expected: Vec<String>,
}

/// BuildError は Executor 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("worker backend selected but no module loader was provided")]
    MissingModuleLoader,

    #[error("Missing pipelines: {0:?}. These pipelines were expected but could not be loaded.")]
    MissingPipelines(Vec<String>),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `RuntimeConfig::from_env()`.
    pub fn from_env() -> Result<Self, BuildError> {
        Ok(Self::new().config(RuntimeConfig::from_env()?))
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this backend as is; the configured backend kind is ignored.
    pub fn backend(mut self, backend: Arc<dyn PipelineBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Module loader for the worker backend.
    pub fn module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.module_loader = Some(loader);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Pipelines that must load at build time.
    pub fn expect_pipelines(mut self, names: &[&str]) -> Self {
        for &name in names {
            if !self.expected.iter().any(|n| n == name) {
                self.expected.push(name.to_string());
            }
        }
        self
    }

    /// Every operation in `catalog` must load at build time.
    pub fn expect_catalog(self, catalog: &OperationCatalog) -> Self {
        let names = catalog.names();
        self.expect_pipelines(&names)
    }

    fn make_backend(&self, ids: Arc<dyn IdGenerator>) -> Result<Arc<dyn PipelineBackend>, BuildError> {
        if let Some(backend) = &self.backend {
            return Ok(backend.clone());
        }
        match self.config.backend {
            BackendKind::Process => {
                let resolver = DirectoryResolver::new(&self.config.artifact_dir)
                    .with_suffix(self.config.artifact_suffix.clone());
                let mut backend = ProcessBackend::new(Arc::new(resolver));
                if let Some(runner) = self.config.runner_command() {
                    backend = backend.with_runner(runner);
                }
                Ok(Arc::new(backend))
            }
            BackendKind::Worker => {
                let loader = self
                    .module_loader
                    .clone()
                    .ok_or(BuildError::MissingModuleLoader)?;
                Ok(Arc::new(WorkerBackend::new(loader, ids)))
            }
        }
    }

    /// Wire the executor and eagerly load every expected pipeline.
    pub async fn build(self) -> Result<Executor, BuildError> {
        let ids: Arc<dyn IdGenerator> = match &self.ids {
            Some(ids) => ids.clone(),
            None => Arc::new(UlidGenerator::new(SystemClock)),
        };
        let clock: Arc<dyn Clock> = match &self.clock {
            Some(clock) => clock.clone(),
            None => Arc::new(SystemClock),
        };
        let backend = self.make_backend(ids.clone())?;
        tracing::info!(
            backend = backend.kind(),
            artifact_dir = %self.config.artifact_dir.display(),
            expected = self.expected.len(),
            "building executor"
        );

        let executor = Executor::new(backend).with_ids(ids).with_clock(clock);

        let mut missing = Vec::new();
        for name in &self.expected {
            if let Err(err) = executor.resolve(name).await {
                tracing::warn!(pipeline = %name, error = %err, "expected pipeline failed to load");
                missing.push(name.clone());
            }
        }
        if !missing.is_empty() {
            return Err(BuildError::MissingPipelines(missing));
        }
        Ok(executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PipelineError, PipelineInput, PipelineOutput, RunResult, InvocationArgs};
    use crate::impls::StaticModuleLoader;
    use crate::ports::PipelineModule;
    use crate::typed::{Operation, ReadParametricMap, ReadSegmentation, WriteParametricMap, dicom_catalog};
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct NoopModule;

    #[async_trait]
    impl PipelineModule for NoopModule {
        async fn run(
            &self,
            _args: &InvocationArgs,
            _inputs: &[PipelineInput],
            _outputs: &[PipelineOutput],
        ) -> Result<RunResult, PipelineError> {
            Ok(RunResult::default())
        }
    }

    fn worker_config() -> RuntimeConfig {
        RuntimeConfig {
            backend: BackendKind::Worker,
            ..RuntimeConfig::default()
        }
    }

    fn loader_with(names: &[&str]) -> Arc<StaticModuleLoader> {
        let loader = names.iter().fold(StaticModuleLoader::new(), |loader, name| {
            loader.with_module(*name, Arc::new(NoopModule))
        });
        Arc::new(loader)
    }

    #[tokio::test]
    async fn worker_backend_needs_a_module_loader() {
        let result = ExecutorBuilder::new().config(worker_config()).build().await;
        assert!(matches!(result, Err(BuildError::MissingModuleLoader)));
    }

    #[tokio::test]
    async fn expected_catalog_is_loaded_eagerly() {
        let loader = loader_with(&[
            ReadSegmentation::NAME,
            ReadParametricMap::NAME,
            WriteParametricMap::NAME,
        ]);
        let executor = ExecutorBuilder::new()
            .config(worker_config())
            .module_loader(loader.clone())
            .expect_catalog(&dicom_catalog().unwrap())
            .build()
            .await
            .unwrap();

        assert_eq!(executor.backend().kind(), "worker");
        assert_eq!(loader.loads(), 3);
        assert_eq!(
            executor.cache().cached_names(),
            vec!["read-parametric-map", "read-segmentation", "write-parametric-map"]
        );
    }

    #[tokio::test]
    async fn missing_pipelines_fail_the_build() {
        let loader = loader_with(&[ReadSegmentation::NAME]);
        let result = ExecutorBuilder::new()
            .config(worker_config())
            .module_loader(loader)
            .expect_pipelines(&[ReadSegmentation::NAME, WriteParametricMap::NAME])
            .build()
            .await;

        assert!(matches!(
            result,
            Err(BuildError::MissingPipelines(missing)) if missing == vec![WriteParametricMap::NAME.to_string()]
        ));
    }

    #[tokio::test]
    async fn no_expectations_means_no_loads() {
        let loader = loader_with(&[ReadSegmentation::NAME]);
        let executor = ExecutorBuilder::new()
            .config(worker_config())
            .module_loader(loader.clone())
            .build()
            .await
            .unwrap();
        assert_eq!(loader.loads(), 0);
        assert!(executor.cache().cached_names().is_empty());
    }

    #[tokio::test]
    async fn process_backend_resolves_from_artifact_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("read-segmentation.sh"), "#!/bin/sh\n").unwrap();
        let config = RuntimeConfig {
            artifact_dir: dir.path().to_path_buf(),
            artifact_suffix: ".sh".into(),
            ..RuntimeConfig::default()
        };

        let executor = ExecutorBuilder::new()
            .config(config.clone())
            .expect_pipelines(&[ReadSegmentation::NAME])
            .build()
            .await
            .unwrap();
        assert_eq!(executor.backend().kind(), "process");

        let result = ExecutorBuilder::new()
            .config(config)
            .expect_pipelines(&[ReadParametricMap::NAME])
            .build()
            .await;
        assert!(matches!(result, Err(BuildError::MissingPipelines(_))));
    }

    #[tokio::test]
    async fn explicit_backend_overrides_config() {
        let loader = loader_with(&[]);
        let ids = Arc::new(UlidGenerator::new(SystemClock));
        let backend = Arc::new(WorkerBackend::new(loader, ids));
        let config = RuntimeConfig {
            artifact_dir: PathBuf::from("/nonexistent"),
            ..RuntimeConfig::default()
        };

        let executor = ExecutorBuilder::new()
            .config(config)
            .backend(backend)
            .build()
            .await
            .unwrap();
        assert_eq!(executor.backend().kind(), "worker");
    }

    #[test]
    fn expectations_are_deduplicated() {
        let builder = ExecutorBuilder::new()
            .expect_pipelines(&[ReadSegmentation::NAME])
            .expect_catalog(&dicom_catalog().unwrap());
        assert_eq!(builder.expected.len(), 3);
    }
}
