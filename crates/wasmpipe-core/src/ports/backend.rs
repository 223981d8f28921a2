//! PipelineBackend port - resolve + invoke
//!
//! 実行環境を実行時に嗅ぎ分ける代わりに、起動時の設定で backend を選びます。
//!
//! # 実装
//! - **ProcessBackend**: ネイティブ / WASI ランナーを子プロセスとして起動
//! - **WorkerBackend**: 共有 worker 上でプロセス内 module を協調実行

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Invocation, PipelineError, RunResult};
use crate::ports::PipelineModule;

/// What a backend produced when it loaded an artifact.
#[derive(Clone)]
pub enum LoadedArtifact {
    /// Executable (or WASI module) on disk, run as a child process.
    Executable(PathBuf),
    /// Module living inside this process.
    Module(Arc<dyn PipelineModule>),
}

impl fmt::Debug for LoadedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executable(path) => f.debug_tuple("Executable").field(path).finish(),
            Self::Module(_) => f.write_str("Module(..)"),
        }
    }
}

/// A resolved, loaded pipeline artifact.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    name: String,
    artifact: LoadedArtifact,
}

impl PipelineHandle {
    pub fn new(name: impl Into<String>, artifact: LoadedArtifact) -> Self {
        Self {
            name: name.into(),
            artifact,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifact(&self) -> &LoadedArtifact {
        &self.artifact
    }
}

/// PipelineBackend は artifact の解決と実行を担う
///
/// # 設計原則
/// - `resolve` はロードを伴う（キャッシュは呼び出し側の PipelineCache が持つ）
/// - `invoke` は 1 回実行して生の RunResult を返す（return value の判定は Executor）
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    /// Short name used in logs ("process", "worker", ...).
    fn kind(&self) -> &'static str;

    async fn resolve(&self, name: &str) -> Result<PipelineHandle, PipelineError>;

    async fn invoke(
        &self,
        handle: &PipelineHandle,
        invocation: &Invocation,
    ) -> Result<RunResult, PipelineError>;
}
