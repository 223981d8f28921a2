//! PipelineModule / ModuleLoader port - プロセス内で動く worker module
//!
//! worker backend は artifact をプロセス内の module としてロードし、
//! 共有 worker コンテキストの上で実行します。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{InvocationArgs, PipelineError, PipelineInput, PipelineOutput, RunResult};

/// PipelineModule はロード済みの不透明な pipeline
///
/// `inputs` のファイル入力は内容（`data`）がロード済みで渡されます。
/// 返す `RunResult::outputs` は `outputs` と同じ順序・同じ数でなければなりません。
#[async_trait]
pub trait PipelineModule: Send + Sync {
    async fn run(
        &self,
        args: &InvocationArgs,
        inputs: &[PipelineInput],
        outputs: &[PipelineOutput],
    ) -> Result<RunResult, PipelineError>;
}

/// ModuleLoader は論理名から PipelineModule をロードする
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, name: &str) -> Result<Arc<dyn PipelineModule>, PipelineError>;
}
