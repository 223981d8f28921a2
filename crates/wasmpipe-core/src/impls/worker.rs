//! WorkerBackend - 共有 worker 上でプロセス内 module を協調実行
//!
//! # 学習ポイント
//! - 単一スロットのリソースプール（`tokio::sync::Mutex<Option<WorkerContext>>`）
//! - worker は初回利用時に遅延生成し、以後の呼び出しで再利用
//! - lock は invocation 全体で保持する（同じ worker 上で呼び出しが交錯しない）

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::payload::ensure_exists;
use crate::domain::{
    Invocation, PipelineError, PipelineInput, PipelineOutput, RunResult, TypedPayload, WorkerId,
};
use crate::impls::staging;
use crate::ports::{IdGenerator, LoadedArtifact, ModuleLoader, PipelineBackend, PipelineHandle};

/// Shared execution context threaded through cooperative invocations.
#[derive(Debug)]
struct WorkerContext {
    id: WorkerId,
    invocations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// `None` until the first invocation creates the worker.
    pub worker_id: Option<WorkerId>,
    pub invocations: u64,
}

pub struct WorkerBackend {
    loader: Arc<dyn ModuleLoader>,
    ids: Arc<dyn IdGenerator>,
    worker: Mutex<Option<WorkerContext>>,
}

impl WorkerBackend {
    pub fn new(loader: Arc<dyn ModuleLoader>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            loader,
            ids,
            worker: Mutex::new(None),
        }
    }

    pub async fn stats(&self) -> WorkerStats {
        let slot = self.worker.lock().await;
        WorkerStats {
            worker_id: slot.as_ref().map(|w| w.id),
            invocations: slot.as_ref().map_or(0, |w| w.invocations),
        }
    }
}

/// ファイル入力の内容をメモリに読み込む（module はファイルシステムを持たない）
async fn load_file_inputs(inputs: &[PipelineInput]) -> Result<Vec<PipelineInput>, PipelineError> {
    let mut loaded = Vec::with_capacity(inputs.len());
    for input in inputs {
        let mut input = input.clone();
        let needs_load = match input.data() {
            TypedPayload::BinaryFile(file) => file.data.is_none(),
            TypedPayload::TextFile(file) => file.data.is_none(),
            _ => false,
        };
        if needs_load
            && let Some(path) = input.data().path().map(|p| p.to_path_buf())
        {
            ensure_exists(&path)?;
            let payload = staging::read_file_payload(input.interface_type(), path).await?;
            *input.data_mut() = payload;
        }
        loaded.push(input);
    }
    Ok(loaded)
}

fn unwritten(destination: &std::path::Path) -> PipelineError {
    PipelineError::contract(format!(
        "module produced no bytes for file output {}",
        destination.display()
    ))
}

/// module が返したファイル出力を宣言どおりの出力先に書き出す
async fn write_file_outputs(
    declared: &[PipelineOutput],
    produced: Vec<PipelineOutput>,
) -> Result<Vec<PipelineOutput>, PipelineError> {
    let mut written = Vec::with_capacity(produced.len());
    for (declared, produced) in declared.iter().zip(produced) {
        let destination = declared.data().and_then(TypedPayload::path);
        let realized = match (destination, produced.into_data()) {
            (Some(destination), Some(TypedPayload::BinaryFile(file))) => {
                let data = file.data.as_ref().ok_or_else(|| unwritten(destination))?;
                tokio::fs::write(destination, data).await?;
                let mut file = file;
                file.path = destination.to_path_buf();
                PipelineOutput::realized(TypedPayload::BinaryFile(file))
            }
            (Some(destination), Some(TypedPayload::TextFile(file))) => {
                let data = file.data.as_ref().ok_or_else(|| unwritten(destination))?;
                tokio::fs::write(destination, data.as_bytes()).await?;
                let mut file = file;
                file.path = destination.to_path_buf();
                PipelineOutput::realized(TypedPayload::TextFile(file))
            }
            (_, Some(payload)) => PipelineOutput::realized(payload),
            (_, None) => {
                return Err(PipelineError::contract(format!(
                    "module left {} output unpopulated",
                    declared.interface_type()
                )));
            }
        };
        written.push(realized);
    }
    Ok(written)
}

#[async_trait]
impl PipelineBackend for WorkerBackend {
    fn kind(&self) -> &'static str {
        "worker"
    }

    async fn resolve(&self, name: &str) -> Result<PipelineHandle, PipelineError> {
        let module = self.loader.load(name).await?;
        Ok(PipelineHandle::new(name, LoadedArtifact::Module(module)))
    }

    async fn invoke(
        &self,
        handle: &PipelineHandle,
        invocation: &Invocation,
    ) -> Result<RunResult, PipelineError> {
        let LoadedArtifact::Module(module) = handle.artifact() else {
            return Err(PipelineError::resource(
                handle.name(),
                "worker backend can only run in-process modules",
            ));
        };

        let inputs = load_file_inputs(&invocation.inputs).await?;

        // ここから invocation 完了まで worker を占有する
        let mut slot = self.worker.lock().await;
        let worker = slot.get_or_insert_with(|| {
            let id = self.ids.generate_worker_id();
            tracing::info!(worker = %id, "worker started");
            WorkerContext { id, invocations: 0 }
        });
        tracing::debug!(worker = %worker.id, pipeline = handle.name(), "worker acquired");

        let result = module
            .run(&invocation.args, &inputs, &invocation.outputs)
            .await;
        worker.invocations += 1;
        drop(slot);

        let mut result = result?;
        if result.return_value == 0 && result.outputs.len() == invocation.outputs.len() {
            let produced = std::mem::take(&mut result.outputs);
            result.outputs = write_file_outputs(&invocation.outputs, produced).await?;
        }
        Ok(result)
    }
}
