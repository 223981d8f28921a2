//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **DirectoryResolver**: 配布ディレクトリからの artifact 解決
//! - **ProcessBackend**: ネイティブ / WASI ランナーを子プロセスで実行
//! - **WorkerBackend**: 共有 worker 上でのプロセス内 module 実行
//! - **StaticModuleLoader**: 名前 → module の静的テーブル
//! - **staging**: memory-io スロットのファイル表現

pub mod dir_resolver;
pub mod process;
pub mod staging;
pub mod static_loader;
pub mod worker;

pub use self::dir_resolver::{DEFAULT_ARTIFACT_SUFFIX, DirectoryResolver};
pub use self::process::{ProcessBackend, RunnerCommand};
pub use self::static_loader::StaticModuleLoader;
pub use self::worker::{WorkerBackend, WorkerStats};
