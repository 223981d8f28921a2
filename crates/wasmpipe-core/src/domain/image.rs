//! Image - pixel buffer + geometry
//!
//! Image は pipeline 境界を越える不透明なコンテナです。ピクセルの意味は解釈せず、
//! 形状（dimension / size / components）とバッファ長の整合性だけを検査します。

use serde::{Deserialize, Serialize};

use super::errors::PipelineError;

/// Scalar type of one pixel component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ComponentType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    Unknown,
    Scalar,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBA")]
    Rgba,
    Offset,
    Vector,
    Point,
    CovariantVector,
    SymmetricSecondRankTensor,
    DiffusionTensor3D,
    Complex,
    FixedArray,
    Array,
    Matrix,
    VariableLengthVector,
    VariableSizeMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageType {
    pub dimension: usize,
    pub component_type: ComponentType,
    pub pixel_type: PixelType,
    pub components: usize,
}

impl ImageType {
    pub fn scalar(dimension: usize, component_type: ComponentType) -> Self {
        Self {
            dimension,
            component_type,
            pixel_type: PixelType::Scalar,
            components: 1,
        }
    }

    /// `None` when the header values overflow.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        self.components.checked_mul(self.component_type.size_in_bytes())
    }
}

/// Raw pixel buffer plus geometry metadata.
///
/// `data` is excluded from the JSON form; codecs move it as a separate
/// binary blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub image_type: ImageType,
    #[serde(default)]
    pub name: String,
    pub origin: Vec<f64>,
    pub spacing: Vec<f64>,
    /// Row-major `dimension x dimension` matrix.
    pub direction: Vec<f64>,
    pub size: Vec<usize>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Image {
    /// Empty image with default geometry: origin 0, spacing 1, identity
    /// direction and zero size.
    pub fn new(image_type: ImageType) -> Self {
        let dimension = image_type.dimension;
        let mut direction = vec![0.0; dimension * dimension];
        for i in 0..dimension {
            direction[i * dimension + i] = 1.0;
        }
        Self {
            image_type,
            name: "image".to_string(),
            origin: vec![0.0; dimension],
            spacing: vec![1.0; dimension],
            direction,
            size: vec![0; dimension],
            metadata: serde_json::Map::new(),
            data: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: Vec<usize>) -> Self {
        self.size = size;
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// `None` when the size overflows `usize`.
    pub fn pixel_count(&self) -> Option<usize> {
        self.size.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
    }

    /// Expected length of `data` in bytes for the current size.
    pub fn expected_data_len(&self) -> Option<usize> {
        self.pixel_count()?.checked_mul(self.image_type.bytes_per_pixel()?)
    }

    /// Checks geometry against `dimension` and, when a buffer is present,
    /// the buffer length against size and pixel type.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let dimension = self.image_type.dimension;
        if dimension == 0 {
            return Err(PipelineError::validation("image dimension must be at least 1"));
        }
        if self.image_type.components == 0 {
            return Err(PipelineError::validation("image must have at least one component"));
        }
        for (field, len) in [
            ("origin", self.origin.len()),
            ("spacing", self.spacing.len()),
            ("size", self.size.len()),
        ] {
            if len != dimension {
                return Err(PipelineError::validation(format!(
                    "image {field} has {len} entries, expected {dimension}"
                )));
            }
        }
        let direction_len = dimension
            .checked_mul(dimension)
            .ok_or_else(|| PipelineError::validation(format!("image dimension {dimension} is too large")))?;
        if self.direction.len() != direction_len {
            return Err(PipelineError::validation(format!(
                "image direction has {} entries, expected {direction_len}",
                self.direction.len()
            )));
        }
        let expected = self.expected_data_len().ok_or_else(|| {
            PipelineError::validation(format!("image size {:?} overflows the address space", self.size))
        })?;
        if !self.data.is_empty() && self.data.len() != expected {
            return Err(PipelineError::validation(format!(
                "image buffer holds {} bytes, expected {expected}",
                self.data.len()
            )));
        }
        Ok(())
    }
}
