//! OperationCatalog - 利用する Operation の登録と管理
//!
//! ExecutorBuilder はカタログ内の全 pipeline を起動時に解決し、
//! 足りない artifact があれば build を失敗させます（Fail-fast）。

use std::collections::BTreeMap;

use super::operation::Operation;
use crate::domain::InterfaceType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    pub name: &'static str,
    pub outputs: &'static [InterfaceType],
}

#[derive(Debug, Default)]
pub struct OperationCatalog {
    operations: BTreeMap<&'static str, OperationInfo>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<O: Operation>(&mut self) -> Result<(), RegistryError> {
        if self.operations.contains_key(O::NAME) {
            return Err(RegistryError::AlreadyRegistered(O::NAME.to_string()));
        }
        self.operations.insert(
            O::NAME,
            OperationInfo {
                name: O::NAME,
                outputs: O::OUTPUTS,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.operations.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationInfo> {
        self.operations.values()
    }
}
