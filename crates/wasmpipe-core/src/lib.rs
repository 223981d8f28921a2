//! wasmpipe-core
//!
//! Typed invocation protocol for precompiled pipeline artifacts.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（payload, image, invocation, state, errors, ids）
//! - **ports**: 抽象化レイヤー（PipelineBackend, ArtifactResolver, ModuleLoader, Clock, IdGenerator）
//! - **impls**: 実装（ProcessBackend, WorkerBackend, DirectoryResolver, memory-io staging）
//! - **app**: アプリケーションロジック（InvocationBuilder, PipelineCache, Executor, ExecutorBuilder）
//! - **typed**: 型付き Operation API（DICOM 操作とカタログ）
//! - **config**: 環境変数 / `.env` からの実行時設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
