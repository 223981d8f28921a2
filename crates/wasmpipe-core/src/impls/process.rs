//! ProcessBackend - ネイティブ / WASI の pipeline を子プロセスとして実行
//!
//! # フロー
//! 1. スクラッチディレクトリを作成し、メモリスロットの入力を書き出す
//! 2. `[runner..., (mount-flag dir)..., artifact, args...]` を起動
//!    （runner 未設定なら artifact を直接起動）
//! 3. 終了コード・stdout・stderr を回収
//! 4. 成功時のみ出力スロット / 出力ファイルを読み戻す

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::{Invocation, PipelineError, PipelineOutput, RunResult};
use crate::impls::staging::{self, MEMORY_IO_DIR_ENV};
use crate::ports::{ArtifactResolver, LoadedArtifact, PipelineBackend, PipelineHandle};

/// External runtime used to execute artifacts, e.g. `wasmtime run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Flag that pre-opens a host directory, e.g. `--dir`.
    pub mount_flag: Option<String>,
}

impl RunnerCommand {
    /// Split a command line on whitespace. Returns `None` for a blank line.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            mount_flag: None,
        })
    }

    pub fn with_mount_flag(mut self, flag: impl Into<String>) -> Self {
        self.mount_flag = Some(flag.into());
        self
    }
}

pub struct ProcessBackend {
    resolver: Arc<dyn ArtifactResolver>,
    runner: Option<RunnerCommand>,
}

impl ProcessBackend {
    pub fn new(resolver: Arc<dyn ArtifactResolver>) -> Self {
        Self {
            resolver,
            runner: None,
        }
    }

    pub fn with_runner(mut self, runner: RunnerCommand) -> Self {
        self.runner = Some(runner);
        self
    }

    fn command(&self, artifact: &Path, invocation: &Invocation, scratch: &Path) -> Command {
        let mut cmd = match &self.runner {
            Some(runner) => {
                let mut cmd = Command::new(&runner.program);
                cmd.args(&runner.args);
                if let Some(flag) = &runner.mount_flag {
                    for dir in invocation.mount_dirs.iter().map(|d| d.as_path()).chain([scratch]) {
                        cmd.arg(flag).arg(dir);
                    }
                }
                cmd.arg(artifact);
                cmd
            }
            None => Command::new(artifact),
        };
        cmd.args(invocation.args.as_slice())
            .env(MEMORY_IO_DIR_ENV, scratch)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl PipelineBackend for ProcessBackend {
    fn kind(&self) -> &'static str {
        "process"
    }

    async fn resolve(&self, name: &str) -> Result<PipelineHandle, PipelineError> {
        let path = self.resolver.locate(name).await?;
        Ok(PipelineHandle::new(name, LoadedArtifact::Executable(path)))
    }

    async fn invoke(
        &self,
        handle: &PipelineHandle,
        invocation: &Invocation,
    ) -> Result<RunResult, PipelineError> {
        let LoadedArtifact::Executable(artifact) = handle.artifact() else {
            return Err(PipelineError::resource(
                handle.name(),
                "process backend can only run executable artifacts",
            ));
        };

        let scratch = tempfile::Builder::new().prefix("wasmpipe-").tempdir()?;
        for (index, input) in invocation.inputs.iter().enumerate() {
            staging::stage_input(scratch.path(), index, input.data()).await?;
        }

        let output = self
            .command(artifact, invocation, scratch.path())
            .output()
            .await
            .map_err(|e| PipelineError::resource(handle.name(), format!("spawn failed: {e}")))?;

        // シグナルで終了した場合は code() が None
        let return_value = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tracing::debug!(
            pipeline = handle.name(),
            return_value,
            stderr_len = stderr.len(),
            "child process exited"
        );

        if return_value != 0 {
            return Ok(RunResult {
                return_value,
                stdout,
                stderr,
                outputs: Vec::new(),
            });
        }

        let mut outputs = Vec::with_capacity(invocation.outputs.len());
        for (index, declared) in invocation.outputs.iter().enumerate() {
            let payload = staging::collect_output(scratch.path(), index, declared).await?;
            outputs.push(PipelineOutput::realized(payload));
        }

        Ok(RunResult {
            return_value,
            stdout,
            stderr,
            outputs,
        })
    }
}
