//! InvocationBuilder - 引数リストと型付き入出力の組み立て
//!
//! # 呼び出し規約
//! `[--memory-io, <input-id>..., <output-id>..., <options>...]`
//!
//! 位置の順序は呼び出し順に依存しません（入力 → 出力 → option の順に並べる）。
//! option で追加されたファイル入力は、位置入力の後ろに入力として追加されます。
//!
//! # Fail-fast 設計
//! - 入力ファイルの存在確認は build 前（dispatch 前）に行う
//! - 必須リストが空なら `Validation`

use std::path::{Path, PathBuf};

use crate::domain::payload::ensure_exists;
use crate::domain::{
    BinaryFile, InterfaceType, Invocation, InvocationArgs, MEMORY_IO_FLAG, PipelineError,
    PipelineInput, PipelineOutput, TypedPayload,
};

/// How a list-valued option treats an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPolicy {
    /// Empty list is rejected with `Validation`.
    NonEmpty,
    /// Empty list emits nothing.
    Optional,
}

#[derive(Debug, Default)]
pub struct InvocationBuilder {
    inputs: Vec<PipelineInput>,
    input_ids: Vec<String>,
    outputs: Vec<PipelineOutput>,
    output_ids: Vec<String>,
    option_inputs: Vec<PipelineInput>,
    options: Vec<String>,
    mount_dirs: Vec<PathBuf>,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl InvocationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn mount_parent_of(&mut self, path: &Path) {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !self.mount_dirs.contains(&dir) {
            self.mount_dirs.push(dir);
        }
    }

    /// Positional input. File payloads are addressed by path, everything
    /// else by its memory slot index.
    pub fn input(mut self, payload: impl Into<TypedPayload>) -> Self {
        let payload = payload.into();
        let id = match payload.path() {
            Some(path) => {
                let id = path_arg(path);
                let path = path.to_path_buf();
                self.mount_parent_of(&path);
                id
            }
            None => self.inputs.len().to_string(),
        };
        self.input_ids.push(id);
        self.inputs.push(PipelineInput::of(payload));
        self
    }

    /// Positional binary file input; the file must exist.
    pub fn input_file(self, path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        Ok(self.input(BinaryFile::existing(path)?))
    }

    /// In-memory output slot.
    pub fn output(mut self, kind: InterfaceType) -> Result<Self, PipelineError> {
        if kind.is_file() {
            return Err(PipelineError::validation(format!(
                "{kind} outputs need a destination, use output_file"
            )));
        }
        self.output_ids.push(self.outputs.len().to_string());
        self.outputs.push(PipelineOutput::new(kind));
        Ok(self)
    }

    /// File-backed output written to `destination`.
    pub fn output_file(mut self, destination: impl Into<TypedPayload>) -> Result<Self, PipelineError> {
        let output = PipelineOutput::with_destination(destination.into())?;
        let path = output
            .data()
            .and_then(TypedPayload::path)
            .map(Path::to_path_buf)
            .ok_or_else(|| PipelineError::validation("file output without a path"))?;
        self.output_ids.push(path_arg(&path));
        self.mount_parent_of(&path);
        self.outputs.push(output);
        Ok(self)
    }

    /// Boolean flag, emitted as `--<name>` only when enabled.
    pub fn flag(mut self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.options.push(format!("--{name}"));
        }
        self
    }

    /// `--<name> <value>`
    pub fn option_value(mut self, name: &str, value: impl ToString) -> Self {
        self.options.push(format!("--{name}"));
        self.options.push(value.to_string());
        self
    }

    /// `--<name> <path>...`; each path also becomes a binary file input.
    pub fn option_files<P: AsRef<Path>>(
        mut self,
        name: &str,
        paths: &[P],
        policy: ListPolicy,
    ) -> Result<Self, PipelineError> {
        if paths.is_empty() {
            return match policy {
                ListPolicy::NonEmpty => Err(PipelineError::validation(format!(
                    "\"{name}\" must contain at least one path"
                ))),
                ListPolicy::Optional => Ok(self),
            };
        }
        for path in paths {
            ensure_exists(path.as_ref())?;
        }

        self.options.push(format!("--{name}"));
        for path in paths {
            let path = path.as_ref();
            self.options.push(path_arg(path));
            self.mount_parent_of(path);
            self.option_inputs.push(PipelineInput::of(BinaryFile::new(path)));
        }
        Ok(self)
    }

    pub fn build(self) -> Invocation {
        let mut args = Vec::with_capacity(
            1 + self.input_ids.len() + self.output_ids.len() + self.options.len(),
        );
        args.push(MEMORY_IO_FLAG.to_string());
        args.extend(self.input_ids);
        args.extend(self.output_ids);
        args.extend(self.options);

        let mut inputs = self.inputs;
        inputs.extend(self.option_inputs);

        Invocation {
            args: InvocationArgs::new(args),
            inputs,
            outputs: self.outputs,
            mount_dirs: self.mount_dirs,
        }
    }
}
