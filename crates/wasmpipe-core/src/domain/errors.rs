//! Errors - エラー型と分類
//!
//! すべての失敗は呼び出し元へ即座に返します（自動リトライなし）。
//! 失敗しても PipelineCache の handle や worker は次の独立した呼び出しで再利用できます。

use std::path::PathBuf;

use thiserror::Error;

/// ErrorKind は失敗の分類
///
/// # 分類
/// - NotFound: 必須の入力ファイルが存在しない（dispatch 前に検出）
/// - Validation: option の制約違反（空リストなど）
/// - Execution: pipeline artifact が失敗した、または不正な出力を返した
/// - Resource: pipeline artifact を解決・ロードできない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Execution,
    Resource,
}

/// PipelineError はプロトコル全体で使うエラー型
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input path does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("pipeline '{pipeline}' failed with return value {return_value}: {stderr}")]
    Execution {
        pipeline: String,
        return_value: i32,
        stderr: String,
    },

    #[error("pipeline contract violated: {0}")]
    ContractViolation(String),

    #[error("pipeline artifact '{name}' could not be resolved: {reason}")]
    Resource { name: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }

    pub fn resource(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 運用分類を返す
    ///
    /// 契約違反・IO・codec の失敗は、いずれも「実行が失敗した」として扱う。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Resource { .. } => ErrorKind::Resource,
            Self::Execution { .. } | Self::ContractViolation(_) | Self::Io(_) | Self::Codec(_) => {
                ErrorKind::Execution
            }
        }
    }
}
