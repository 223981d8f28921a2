//! DirectoryResolver - 配布ディレクトリから artifact を探す
//!
//! `<root>/<name><suffix>`（既定の suffix は `.wasi.wasm`）を解決します。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::domain::PipelineError;
use crate::ports::ArtifactResolver;

pub const DEFAULT_ARTIFACT_SUFFIX: &str = ".wasi.wasm";

const WASM_MAGIC: [u8; 4] = *b"\0asm";

#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
    suffix: String,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{}", self.suffix))
    }
}

#[async_trait]
impl ArtifactResolver for DirectoryResolver {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn locate(&self, name: &str) -> Result<PathBuf, PipelineError> {
        let path = self.artifact_path(name);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| PipelineError::resource(name, format!("{}: {e}", path.display())))?;
        if !metadata.is_file() {
            return Err(PipelineError::resource(
                name,
                format!("{} is not a file", path.display()),
            ));
        }

        if path.extension().is_some_and(|ext| ext == "wasm") {
            let mut header = [0u8; 4];
            let mut file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| PipelineError::resource(name, e.to_string()))?;
            let is_wasm = match file.read_exact(&mut header).await {
                Ok(_) => header == WASM_MAGIC,
                Err(_) => false,
            };
            if !is_wasm {
                return Err(PipelineError::resource(
                    name,
                    format!("{} is not a WebAssembly module", path.display()),
                ));
            }
        }

        tracing::debug!(pipeline = name, path = %path.display(), "artifact located");
        Ok(path)
    }
}
