//! PipelineInput / PipelineOutput - 型付きの入出力宣言

use super::errors::PipelineError;
use super::interface_type::InterfaceType;
use super::payload::TypedPayload;

/// A typed input. Its position in the inputs list is its memory slot index.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    interface_type: InterfaceType,
    data: TypedPayload,
}

impl PipelineInput {
    /// Pair a payload with its declared type; the tags must agree.
    pub fn new(interface_type: InterfaceType, data: TypedPayload) -> Result<Self, PipelineError> {
        if data.interface_type() != interface_type {
            return Err(PipelineError::validation(format!(
                "input declared as {interface_type} but payload is {}",
                data.interface_type()
            )));
        }
        Ok(Self {
            interface_type,
            data,
        })
    }

    /// Declare an input with the payload's own tag.
    pub fn of(data: impl Into<TypedPayload>) -> Self {
        let data = data.into();
        Self {
            interface_type: data.interface_type(),
            data,
        }
    }

    pub fn interface_type(&self) -> InterfaceType {
        self.interface_type
    }

    pub fn data(&self) -> &TypedPayload {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut TypedPayload {
        &mut self.data
    }
}

/// A declared result slot.
///
/// File-backed outputs carry their destination before execution; every
/// output carries its realized payload after execution.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    interface_type: InterfaceType,
    data: Option<TypedPayload>,
}

impl PipelineOutput {
    pub fn new(interface_type: InterfaceType) -> Self {
        Self {
            interface_type,
            data: None,
        }
    }

    /// File-backed output slot with its destination.
    pub fn with_destination(data: TypedPayload) -> Result<Self, PipelineError> {
        let interface_type = data.interface_type();
        if !interface_type.is_file() {
            return Err(PipelineError::validation(format!(
                "{interface_type} outputs are memory slots and take no destination"
            )));
        }
        Ok(Self {
            interface_type,
            data: Some(data),
        })
    }

    /// Realized output reported by a backend.
    pub fn realized(data: TypedPayload) -> Self {
        Self {
            interface_type: data.interface_type(),
            data: Some(data),
        }
    }

    pub fn interface_type(&self) -> InterfaceType {
        self.interface_type
    }

    pub fn data(&self) -> Option<&TypedPayload> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<TypedPayload> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BinaryFile, ErrorKind};
    use serde_json::json;

    #[test]
    fn input_tag_must_match_payload() {
        let ok = PipelineInput::new(InterfaceType::JsonCompatible, json!({}).into());
        assert!(ok.is_ok());

        let err = PipelineInput::new(InterfaceType::Image, json!({}).into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn only_file_outputs_take_a_destination() {
        let ok = PipelineOutput::with_destination(BinaryFile::new("out.dcm").into()).unwrap();
        assert_eq!(ok.interface_type(), InterfaceType::BinaryFile);

        let err = PipelineOutput::with_destination(json!(1).into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
