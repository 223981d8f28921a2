//! TypedPayload - 境界を越える 1 つの値
//!
//! # 学習ポイント
//! - tagged union（enum）で種類ごとの表現を分ける
//! - 暗黙の型変換はしない（Image を JSON として渡すことはできない）

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::PipelineError;
use super::image::Image;
use super::interface_type::InterfaceType;

/// Reference to a binary file, optionally with its contents loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryFile {
    pub path: PathBuf,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
}

impl BinaryFile {
    /// Reference a file that does not have to exist yet (outputs).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: None,
        }
    }

    /// Reference an input file, failing with `NotFound` if it is missing.
    pub fn existing(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        ensure_exists(&path)?;
        Ok(Self::new(path))
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

/// Reference to a text file, optionally with its contents loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFile {
    pub path: PathBuf,
    #[serde(skip)]
    pub data: Option<String>,
}

impl TextFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: None,
        }
    }

    pub fn existing(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        ensure_exists(&path)?;
        Ok(Self::new(path))
    }

    pub fn with_data(mut self, data: String) -> Self {
        self.data = Some(data);
        self
    }
}

pub(crate) fn ensure_exists(path: &Path) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::not_found(path))
    }
}

/// One value crossing the invocation boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedPayload {
    TextFile(TextFile),
    BinaryFile(BinaryFile),
    TextStream(String),
    BinaryStream(Vec<u8>),
    Image(Image),
    JsonCompatible(serde_json::Value),
}

impl TypedPayload {
    pub fn interface_type(&self) -> InterfaceType {
        match self {
            Self::TextFile(_) => InterfaceType::TextFile,
            Self::BinaryFile(_) => InterfaceType::BinaryFile,
            Self::TextStream(_) => InterfaceType::TextStream,
            Self::BinaryStream(_) => InterfaceType::BinaryStream,
            Self::Image(_) => InterfaceType::Image,
            Self::JsonCompatible(_) => InterfaceType::JsonCompatible,
        }
    }

    /// Path of a file-backed payload.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::TextFile(f) => Some(&f.path),
            Self::BinaryFile(f) => Some(&f.path),
            _ => None,
        }
    }

    pub fn into_image(self) -> Result<Image, PipelineError> {
        match self {
            Self::Image(image) => Ok(image),
            other => Err(unexpected(InterfaceType::Image, &other)),
        }
    }

    pub fn into_json(self) -> Result<serde_json::Value, PipelineError> {
        match self {
            Self::JsonCompatible(value) => Ok(value),
            other => Err(unexpected(InterfaceType::JsonCompatible, &other)),
        }
    }

    pub fn into_binary_file(self) -> Result<BinaryFile, PipelineError> {
        match self {
            Self::BinaryFile(file) => Ok(file),
            other => Err(unexpected(InterfaceType::BinaryFile, &other)),
        }
    }
}

fn unexpected(expected: InterfaceType, got: &TypedPayload) -> PipelineError {
    PipelineError::contract(format!(
        "expected {expected} payload, got {}",
        got.interface_type()
    ))
}

impl From<Image> for TypedPayload {
    fn from(image: Image) -> Self {
        Self::Image(image)
    }
}

impl From<serde_json::Value> for TypedPayload {
    fn from(value: serde_json::Value) -> Self {
        Self::JsonCompatible(value)
    }
}

impl From<BinaryFile> for TypedPayload {
    fn from(file: BinaryFile) -> Self {
        Self::BinaryFile(file)
    }
}

impl From<TextFile> for TypedPayload {
    fn from(file: TextFile) -> Self {
        Self::TextFile(file)
    }
}
