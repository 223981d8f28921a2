//! Invocation - 1 回の呼び出しに必要な全情報
//!
//! # 呼び出し規約
//! `[--memory-io, <input-id>..., <output-id>..., <options>...]`
//! - id はファイルパス、またはメモリスロット番号（"0", "1", ...）

use std::path::PathBuf;

use super::errors::PipelineError;
use super::io::{PipelineInput, PipelineOutput};

/// Mode flag that always leads the argument line.
pub const MEMORY_IO_FLAG: &str = "--memory-io";

/// Ordered positional/flag arguments consumed by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationArgs(Vec<String>);

impl InvocationArgs {
    pub fn new(args: Vec<String>) -> Self {
        Self(args)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a InvocationArgs {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Arguments plus the typed input/output declarations they refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub args: InvocationArgs,
    pub inputs: Vec<PipelineInput>,
    pub outputs: Vec<PipelineOutput>,
    /// Host directories a sandboxed runner has to pre-open.
    pub mount_dirs: Vec<PathBuf>,
}

impl Invocation {
    /// Checks that every declared input still agrees with its payload and
    /// that images are internally consistent.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.args.as_slice().first().map(String::as_str) != Some(MEMORY_IO_FLAG) {
            return Err(PipelineError::contract(format!(
                "argument line must start with {MEMORY_IO_FLAG}"
            )));
        }
        for (index, input) in self.inputs.iter().enumerate() {
            let tag = input.data().interface_type();
            if tag != input.interface_type() {
                return Err(PipelineError::validation(format!(
                    "input {index} declared as {} but payload is {tag}",
                    input.interface_type()
                )));
            }
            if let super::TypedPayload::Image(image) = input.data() {
                image.validate()?;
            }
        }
        Ok(())
    }
}

/// What a backend reports after running a pipeline once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunResult {
    pub return_value: i32,
    pub stdout: String,
    pub stderr: String,
    pub outputs: Vec<PipelineOutput>,
}

impl RunResult {
    pub fn success(outputs: Vec<PipelineOutput>) -> Self {
        Self {
            outputs,
            ..Self::default()
        }
    }
}
