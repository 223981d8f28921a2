//! Config - 実行時設定
//!
//! `.env` を読み込んだうえで環境変数から組み立てます。
//! CLI の引数は各項目を上書きできます。
//!
//! | 変数 | 既定値 |
//! |------|--------|
//! | `WASMPIPE_BACKEND` | `process` |
//! | `WASMPIPE_ARTIFACT_DIR` | `wasm_modules` |
//! | `WASMPIPE_ARTIFACT_SUFFIX` | `.wasi.wasm` |
//! | `WASMPIPE_RUNNER` | なし（artifact を直接起動） |
//! | `WASMPIPE_MOUNT_FLAG` | なし |

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::impls::{DEFAULT_ARTIFACT_SUFFIX, RunnerCommand};

pub const BACKEND_ENV: &str = "WASMPIPE_BACKEND";
pub const ARTIFACT_DIR_ENV: &str = "WASMPIPE_ARTIFACT_DIR";
pub const ARTIFACT_SUFFIX_ENV: &str = "WASMPIPE_ARTIFACT_SUFFIX";
pub const RUNNER_ENV: &str = "WASMPIPE_RUNNER";
pub const MOUNT_FLAG_ENV: &str = "WASMPIPE_MOUNT_FLAG";

pub const DEFAULT_ARTIFACT_DIR: &str = "wasm_modules";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Child process per invocation (native or WASI runner).
    #[default]
    Process,
    /// In-process modules on a shared cooperative worker.
    Worker,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(Self::Process),
            "worker" => Ok(Self::Worker),
            _ => Err(ConfigError::InvalidValue {
                key: BACKEND_ENV,
                value: s.to_string(),
                expected: "process | worker",
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid, expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub backend: BackendKind,
    pub artifact_dir: PathBuf,
    pub artifact_suffix: String,
    /// Runner command line, split on whitespace (e.g. `wasmtime run`).
    pub runner: Option<String>,
    /// Runner flag that pre-opens a host directory (e.g. `--dir`).
    pub mount_flag: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            artifact_suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
            runner: None,
            mount_flag: None,
        }
    }
}

impl RuntimeConfig {
    /// Load `.env` (if any), then read the `WASMPIPE_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(backend) = get(BACKEND_ENV) {
            config.backend = backend.parse()?;
        }
        if let Some(dir) = get(ARTIFACT_DIR_ENV) {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Some(suffix) = get(ARTIFACT_SUFFIX_ENV) {
            config.artifact_suffix = suffix;
        }
        config.runner = get(RUNNER_ENV);
        config.mount_flag = get(MOUNT_FLAG_ENV);
        Ok(config)
    }

    /// Runner command for the process backend, if one is configured.
    pub fn runner_command(&self) -> Option<RunnerCommand> {
        let runner = RunnerCommand::parse(self.runner.as_deref()?)?;
        Some(match &self.mount_flag {
            Some(flag) => runner.with_mount_flag(flag.clone()),
            None => runner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.backend, BackendKind::Process);
        assert_eq!(config.artifact_dir, PathBuf::from("wasm_modules"));
        assert!(config.runner_command().is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (BACKEND_ENV, "worker"),
            (ARTIFACT_DIR_ENV, "/opt/pipelines"),
            (ARTIFACT_SUFFIX_ENV, ".wasm"),
            (RUNNER_ENV, "wasmtime run"),
            (MOUNT_FLAG_ENV, "--dir"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::Worker);
        assert_eq!(config.artifact_dir, PathBuf::from("/opt/pipelines"));
        assert_eq!(config.artifact_suffix, ".wasm");

        let runner = config.runner_command().unwrap();
        assert_eq!(runner.program, "wasmtime");
        assert_eq!(runner.args, vec!["run".to_string()]);
        assert_eq!(runner.mount_flag.as_deref(), Some("--dir"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = RuntimeConfig::from_lookup(lookup(&[(RUNNER_ENV, "   "), (BACKEND_ENV, "")])).unwrap();
        assert_eq!(config.runner, None);
        assert_eq!(config.backend, BackendKind::Process);
    }

    #[rstest]
    #[case("process", BackendKind::Process)]
    #[case("Worker", BackendKind::Worker)]
    #[case(" worker ", BackendKind::Worker)]
    fn backend_kind_parses(#[case] input: &str, #[case] expected: BackendKind) {
        assert_eq!(input.parse::<BackendKind>().unwrap(), expected);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = RuntimeConfig::from_lookup(lookup(&[(BACKEND_ENV, "browser")])).unwrap_err();
        assert!(err.to_string().contains("process | worker"));
    }

    #[test]
    fn serde_uses_lowercase_backend_names() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"backend":"worker"}"#).unwrap();
        assert_eq!(config.backend, BackendKind::Worker);
        assert_eq!(config.artifact_suffix, DEFAULT_ARTIFACT_SUFFIX);
    }
}
