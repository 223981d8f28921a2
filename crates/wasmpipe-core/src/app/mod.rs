//! App - アプリケーション層
//!
//! ports を組み合わせて pipeline 呼び出しを駆動します。
//!
//! # 主要コンポーネント
//! - **InvocationBuilder**: 引数リストと型付き入出力の組み立て
//! - **PipelineCache**: 論理名ごとの handle キャッシュ（初回のみロード）
//! - **Executor**: 状態機械に沿った 1 回の呼び出し（同期 / 非同期）
//! - **ExecutorBuilder**: 設定からのワイヤリングと起動時検証

pub mod builder;
pub mod cache;
pub mod executor;
pub mod invocation_builder;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ExecutorBuilder};
pub use self::cache::PipelineCache;
pub use self::executor::Executor;
pub use self::invocation_builder::{InvocationBuilder, ListPolicy};
