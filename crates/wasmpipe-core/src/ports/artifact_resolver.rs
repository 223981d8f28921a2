//! ArtifactResolver port - 論理名から pipeline artifact の場所を解決
//!
//! # 実装
//! - **DirectoryResolver**: `<root>/<name><suffix>` を探す

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::PipelineError;

/// ArtifactResolver は artifact を見つけて検証する
///
/// # 設計原則
/// - 見つからない / 壊れている場合は `PipelineError::Resource`（リトライしない）
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn locate(&self, name: &str) -> Result<PathBuf, PipelineError>;
}
