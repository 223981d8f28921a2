//! DICOM operations built on the invocation protocol.
//!
//! The conversions themselves live inside the pipeline artifacts; these
//! types only describe their calling conventions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::operation::{Operation, expect_payloads};
use crate::app::{InvocationBuilder, ListPolicy};
use crate::domain::{
    BinaryFile, Image, InterfaceType, Invocation, PipelineError, PipelineOutput,
};

/// Read DICOM segmentation objects into a label image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSegmentation {
    pub dicom_file: PathBuf,
    /// Merge all segments into a single image.
    #[serde(default)]
    pub merge_segments: bool,
}

impl ReadSegmentation {
    pub fn new(dicom_file: impl Into<PathBuf>) -> Self {
        Self {
            dicom_file: dicom_file.into(),
            merge_segments: false,
        }
    }

    pub fn merge_segments(mut self, merge: bool) -> Self {
        self.merge_segments = merge;
        self
    }
}

impl Operation for ReadSegmentation {
    const NAME: &'static str = "read-segmentation";
    const OUTPUTS: &'static [InterfaceType] = &[InterfaceType::Image];
    type Output = Image;

    fn build(self) -> Result<Invocation, PipelineError> {
        Ok(InvocationBuilder::new()
            .input_file(self.dicom_file)?
            .output(InterfaceType::Image)?
            .flag("merge-segments", self.merge_segments)
            .build())
    }

    fn decode(outputs: Vec<PipelineOutput>) -> Result<Image, PipelineError> {
        let [image] = expect_payloads::<1>(outputs)?;
        image.into_image()
    }
}

/// Read a DICOM parametric map into an image plus its meta information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadParametricMap {
    pub dicom_file: PathBuf,
}

impl ReadParametricMap {
    pub fn new(dicom_file: impl Into<PathBuf>) -> Self {
        Self {
            dicom_file: dicom_file.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadParametricMapResult {
    pub param_image: Image,
    pub meta_info: serde_json::Value,
}

impl Operation for ReadParametricMap {
    const NAME: &'static str = "read-parametric-map";
    const OUTPUTS: &'static [InterfaceType] = &[InterfaceType::Image, InterfaceType::JsonCompatible];
    type Output = ReadParametricMapResult;

    fn build(self) -> Result<Invocation, PipelineError> {
        Ok(InvocationBuilder::new()
            .input_file(self.dicom_file)?
            .output(InterfaceType::Image)?
            .output(InterfaceType::JsonCompatible)?
            .build())
    }

    fn decode(outputs: Vec<PipelineOutput>) -> Result<Self::Output, PipelineError> {
        let [image, meta] = expect_payloads::<2>(outputs)?;
        Ok(ReadParametricMapResult {
            param_image: image.into_image()?,
            meta_info: meta.into_json()?,
        })
    }
}

/// Convert an image plus meta information into a DICOM parametric map.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteParametricMap {
    pub paramap_image: Image,
    pub meta_info: serde_json::Value,
    pub output_dicom_file: PathBuf,
    /// Source series the map was derived from. Must not be empty.
    pub ref_dicom_series: Vec<PathBuf>,
}

impl WriteParametricMap {
    pub fn new(
        paramap_image: Image,
        meta_info: serde_json::Value,
        output_dicom_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            paramap_image,
            meta_info,
            output_dicom_file: output_dicom_file.into(),
            ref_dicom_series: Vec::new(),
        }
    }

    pub fn ref_dicom_series<P: Into<PathBuf>>(mut self, series: impl IntoIterator<Item = P>) -> Self {
        self.ref_dicom_series = series.into_iter().map(Into::into).collect();
        self
    }
}

impl Operation for WriteParametricMap {
    const NAME: &'static str = "write-parametric-map";
    const OUTPUTS: &'static [InterfaceType] = &[InterfaceType::BinaryFile];
    /// Path of the written DICOM file.
    type Output = PathBuf;

    fn build(self) -> Result<Invocation, PipelineError> {
        Ok(InvocationBuilder::new()
            .input(self.paramap_image)
            .input(self.meta_info)
            .output_file(BinaryFile::new(self.output_dicom_file))?
            .option_files("ref-dicom-series", &self.ref_dicom_series, ListPolicy::NonEmpty)?
            .build())
    }

    fn decode(outputs: Vec<PipelineOutput>) -> Result<PathBuf, PipelineError> {
        let [file] = expect_payloads::<1>(outputs)?;
        Ok(file.into_binary_file()?.path)
    }
}
