use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of data a pipeline parameter accepts or produces.
///
/// The tag travels next to every input/output so both sides of the
/// invocation agree on how a slot is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceType {
    TextFile,
    BinaryFile,
    TextStream,
    BinaryStream,
    Image,
    JsonCompatible,
}

impl InterfaceType {
    /// File-backed kinds are addressed by path on the argument line,
    /// everything else by memory slot index.
    pub fn is_file(self) -> bool {
        matches!(self, Self::TextFile | Self::BinaryFile)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextFile => "TextFile",
            Self::BinaryFile => "BinaryFile",
            Self::TextStream => "TextStream",
            Self::BinaryStream => "BinaryStream",
            Self::Image => "Image",
            Self::JsonCompatible => "JsonCompatible",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
