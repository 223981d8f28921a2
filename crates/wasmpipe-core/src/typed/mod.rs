//! Typed - 型付き Operation API
//!
//! 論理名の typo を型で排除し、引数の組み立てと出力のデコードを
//! 1 つの型にまとめます。
//!
//! # 二層構造
//! - **表層（Typed）**: `Operation` trait - 操作ごとの入出力型
//! - **内部（Untyped）**: `Invocation` / `PipelineOutput` - Executor が扱う形

pub mod catalog;
pub mod dicom;
pub mod operation;

pub use self::catalog::{OperationCatalog, OperationInfo, RegistryError};
pub use self::dicom::{ReadParametricMap, ReadParametricMapResult, ReadSegmentation, WriteParametricMap};
pub use self::operation::{Operation, expect_payloads};

/// Catalog with every DICOM operation shipped by this crate.
pub fn dicom_catalog() -> Result<OperationCatalog, RegistryError> {
    let mut catalog = OperationCatalog::new();
    catalog.register::<ReadSegmentation>()?;
    catalog.register::<ReadParametricMap>()?;
    catalog.register::<WriteParametricMap>()?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dicom_catalog_registers_every_operation() {
        let catalog = dicom_catalog().unwrap();
        assert_eq!(
            catalog.names(),
            vec![ReadParametricMap::NAME, ReadSegmentation::NAME, WriteParametricMap::NAME]
        );
        assert_eq!(catalog.get(WriteParametricMap::NAME).unwrap().outputs, WriteParametricMap::OUTPUTS);
    }
}
