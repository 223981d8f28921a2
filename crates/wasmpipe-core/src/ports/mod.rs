//! Ports - 抽象化レイヤー
//!
//! 外部の協調者（artifact の解決・ロード、共有 worker、時刻、ID 生成）への
//! インターフェースを定義し、実装の詳細を隠蔽します。

pub mod artifact_resolver;
pub mod backend;
pub mod clock;
pub mod id_generator;
pub mod module;

pub use self::artifact_resolver::ArtifactResolver;
pub use self::backend::{LoadedArtifact, PipelineBackend, PipelineHandle};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::module::{ModuleLoader, PipelineModule};
