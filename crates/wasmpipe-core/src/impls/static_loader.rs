//! StaticModuleLoader - 事前に登録した module を名前で返す ModuleLoader
//!
//! 組み込み用途とテスト用。`loads()` でロード回数を観測できるので、
//! PipelineCache の冪等性の確認にも使えます。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::PipelineError;
use crate::ports::{ModuleLoader, PipelineModule};

#[derive(Default)]
pub struct StaticModuleLoader {
    modules: HashMap<String, Arc<dyn PipelineModule>>,
    loads: AtomicUsize,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `name`. Last registration wins.
    pub fn with_module(mut self, name: impl Into<String>, module: Arc<dyn PipelineModule>) -> Self {
        self.modules.insert(name.into(), module);
        self
    }

    /// Number of successful `load` calls so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn load(&self, name: &str) -> Result<Arc<dyn PipelineModule>, PipelineError> {
        let module = self
            .modules
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::resource(name, "no module registered under this name"))?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(module)
    }
}
