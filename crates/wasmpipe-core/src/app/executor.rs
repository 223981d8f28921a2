//! Executor - 1 回の pipeline 呼び出しを駆動する
//!
//! # フロー
//! 1. `Idle → ArgsBuilt`: invocation を検証し、ファイル入力の存在を確認
//! 2. PipelineCache 経由で handle を取得（初回のみロード）
//! 3. `ArgsBuilt → Dispatched`: backend で 1 回実行
//! 4. RunResult を検査（return value・出力数・出力の種類）
//! 5. `Dispatched → Completed`、失敗はすべて `Failed` で即座に返す
//!
//! # 学習ポイント
//! - `tracing::Instrument` で invocation ごとに span を張る
//! - 同期呼び出し（native mode）は専用の current-thread runtime で `block_on`

use std::sync::Arc;

use tracing::Instrument;

use crate::app::PipelineCache;
use crate::domain::payload::ensure_exists;
use crate::domain::{
    Invocation, InvocationState, PipelineError, PipelineOutput, RunResult, TypedPayload,
};
use crate::ports::{Clock, IdGenerator, PipelineBackend, PipelineHandle, SystemClock, UlidGenerator};
use crate::typed::Operation;

pub struct Executor {
    backend: Arc<dyn PipelineBackend>,
    cache: PipelineCache,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Executor {
    pub fn new(backend: Arc<dyn PipelineBackend>) -> Self {
        Self {
            backend,
            cache: PipelineCache::new(),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &dyn PipelineBackend {
        self.backend.as_ref()
    }

    pub fn cache(&self) -> &PipelineCache {
        &self.cache
    }

    /// Load the handle for `name` without running it.
    pub async fn resolve(&self, name: &str) -> Result<Arc<PipelineHandle>, PipelineError> {
        self.cache.get_or_resolve(name, self.backend.as_ref()).await
    }

    /// Run `name` once and return its outputs in declared order.
    pub async fn run(
        &self,
        name: &str,
        invocation: Invocation,
    ) -> Result<Vec<PipelineOutput>, PipelineError> {
        let id = self.ids.generate_invocation_id();
        let span = tracing::info_span!("invocation", %id, pipeline = name);
        self.run_in_span(name, invocation).instrument(span).await
    }

    async fn run_in_span(
        &self,
        name: &str,
        invocation: Invocation,
    ) -> Result<Vec<PipelineOutput>, PipelineError> {
        let started = self.clock.now();
        let mut state = InvocationState::Idle;

        let outcome = self.drive(name, &invocation, &mut state).await;
        let reached = state;
        let (state, outcome) = settle(state, outcome);
        let elapsed_ms = (self.clock.now() - started).num_milliseconds();
        match &outcome {
            Ok(outputs) => {
                tracing::debug!(?state, elapsed_ms, outputs = outputs.len(), "invocation completed");
            }
            Err(err) => {
                tracing::warn!(from = ?reached, ?state, elapsed_ms, kind = ?err.kind(), error = %err, "invocation failed");
            }
        }
        outcome
    }

    async fn drive(
        &self,
        name: &str,
        invocation: &Invocation,
        state: &mut InvocationState,
    ) -> Result<Vec<PipelineOutput>, PipelineError> {
        invocation.validate()?;
        for input in &invocation.inputs {
            if let Some(path) = unloaded_file_path(input.data()) {
                ensure_exists(path)?;
            }
        }
        *state = state.transition(InvocationState::ArgsBuilt)?;
        tracing::debug!(?state, args = ?invocation.args.as_slice(), "arguments built");

        let handle = self.resolve(name).await?;

        *state = state.transition(InvocationState::Dispatched)?;
        tracing::debug!(?state, backend = self.backend.kind(), "dispatching");
        let result = self.backend.invoke(&handle, invocation).await?;

        check_result(name, &invocation.outputs, result)
    }

    /// Build, run and decode a typed operation.
    pub async fn run_op<O: Operation>(&self, operation: O) -> Result<O::Output, PipelineError> {
        let invocation = operation.build()?;
        let outputs = self.run(O::NAME, invocation).await?;
        O::decode(outputs)
    }

    /// Blocking variant of [`Executor::run`] for callers without a runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn run_blocking(
        &self,
        name: &str,
        invocation: Invocation,
    ) -> Result<Vec<PipelineOutput>, PipelineError> {
        blocking_runtime()?.block_on(self.run(name, invocation))
    }

    /// Blocking variant of [`Executor::run_op`].
    pub fn run_op_blocking<O: Operation>(&self, operation: O) -> Result<O::Output, PipelineError> {
        blocking_runtime()?.block_on(self.run_op(operation))
    }
}

/// 実行結果に応じて終端状態（Completed / Failed）へ遷移する
fn settle<T>(
    state: InvocationState,
    outcome: Result<T, PipelineError>,
) -> (InvocationState, Result<T, PipelineError>) {
    match outcome {
        Ok(value) => match state.transition(InvocationState::Completed) {
            Ok(done) => (done, Ok(value)),
            Err(err) => (InvocationState::Failed, Err(err)),
        },
        // 終端以外のどの状態からも Failed へ遷移できる
        Err(err) => (
            state
                .transition(InvocationState::Failed)
                .unwrap_or(InvocationState::Failed),
            Err(err),
        ),
    }
}

fn blocking_runtime() -> Result<tokio::runtime::Runtime, PipelineError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn unloaded_file_path(payload: &TypedPayload) -> Option<&std::path::Path> {
    match payload {
        TypedPayload::BinaryFile(file) if file.data.is_none() => Some(&file.path),
        TypedPayload::TextFile(file) if file.data.is_none() => Some(&file.path),
        _ => None,
    }
}

/// return value と出力の形を宣言と突き合わせる
fn check_result(
    name: &str,
    declared: &[PipelineOutput],
    result: RunResult,
) -> Result<Vec<PipelineOutput>, PipelineError> {
    if result.return_value != 0 {
        return Err(PipelineError::Execution {
            pipeline: name.to_string(),
            return_value: result.return_value,
            stderr: result.stderr,
        });
    }
    if !result.stderr.is_empty() {
        tracing::debug!(stderr = %result.stderr, "pipeline wrote to stderr");
    }
    if result.outputs.len() != declared.len() {
        return Err(PipelineError::contract(format!(
            "'{name}' returned {} outputs, {} declared",
            result.outputs.len(),
            declared.len()
        )));
    }
    for (index, (declared, produced)) in declared.iter().zip(&result.outputs).enumerate() {
        let actual = produced
            .data()
            .map_or(produced.interface_type(), TypedPayload::interface_type);
        if actual != declared.interface_type() {
            return Err(PipelineError::contract(format!(
                "'{name}' output {index} is {actual}, {} declared",
                declared.interface_type()
            )));
        }
        if produced.data().is_none() {
            return Err(PipelineError::contract(format!(
                "'{name}' output {index} was not populated"
            )));
        }
    }
    Ok(result.outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ComponentType, ErrorKind, Image, ImageType, InterfaceType, InvocationArgs, PipelineInput,
    };
    use crate::impls::{StaticModuleLoader, WorkerBackend};
    use crate::ports::PipelineModule;
    use crate::typed::{ReadParametricMap, ReadSegmentation, WriteParametricMap};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// 宣言された出力の種類に合わせて固定の payload を返す module
    #[derive(Default)]
    struct EchoModule {
        seen_args: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl PipelineModule for EchoModule {
        async fn run(
            &self,
            args: &InvocationArgs,
            _inputs: &[PipelineInput],
            outputs: &[PipelineOutput],
        ) -> Result<RunResult, PipelineError> {
            self.seen_args.lock().unwrap().push(args.as_slice().to_vec());
            let produced = outputs
                .iter()
                .map(|output| {
                    let payload: TypedPayload = match output.interface_type() {
                        InterfaceType::Image => Image::new(ImageType::scalar(3, ComponentType::UInt16))
                            .with_size(vec![1, 1, 1])
                            .with_data(vec![7, 0])
                            .into(),
                        InterfaceType::JsonCompatible => json!({"SeriesDescription": "ADC"}).into(),
                        InterfaceType::BinaryFile => crate::domain::BinaryFile::new("out.dcm")
                            .with_data(b"DICM".to_vec())
                            .into(),
                        other => panic!("unexpected output {other}"),
                    };
                    PipelineOutput::realized(payload)
                })
                .collect();
            Ok(RunResult::success(produced))
        }
    }

    /// 常に非ゼロで終了する module
    struct FailingModule;

    #[async_trait]
    impl PipelineModule for FailingModule {
        async fn run(
            &self,
            _args: &InvocationArgs,
            _inputs: &[PipelineInput],
            _outputs: &[PipelineOutput],
        ) -> Result<RunResult, PipelineError> {
            Ok(RunResult {
                return_value: 2,
                stderr: "could not parse DICOM".into(),
                ..RunResult::default()
            })
        }
    }

    /// 宣言より少ない出力を返す module
    struct ShortModule;

    #[async_trait]
    impl PipelineModule for ShortModule {
        async fn run(
            &self,
            _args: &InvocationArgs,
            _inputs: &[PipelineInput],
            _outputs: &[PipelineOutput],
        ) -> Result<RunResult, PipelineError> {
            Ok(RunResult::success(vec![PipelineOutput::realized(
                Image::new(ImageType::scalar(2, ComponentType::UInt8)).into(),
            )]))
        }
    }

    struct Fixture {
        executor: Executor,
        loader: Arc<StaticModuleLoader>,
        backend: Arc<WorkerBackend>,
        echo: Arc<EchoModule>,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let echo = Arc::new(EchoModule::default());
            let loader = Arc::new(
                StaticModuleLoader::new()
                    .with_module(ReadSegmentation::NAME, echo.clone())
                    .with_module(ReadParametricMap::NAME, echo.clone())
                    .with_module(WriteParametricMap::NAME, echo.clone())
                    .with_module("always-fails", Arc::new(FailingModule))
                    .with_module("short", Arc::new(ShortModule)),
            );
            let ids = Arc::new(UlidGenerator::new(SystemClock));
            let backend = Arc::new(WorkerBackend::new(loader.clone(), ids));
            Self {
                executor: Executor::new(backend.clone()),
                loader,
                backend,
                echo,
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn dicom(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"DICM").unwrap();
            path
        }
    }

    fn image_only_invocation() -> Invocation {
        Invocation {
            args: InvocationArgs::new(vec!["--memory-io".into(), "0".into()]),
            inputs: Vec::new(),
            outputs: vec![PipelineOutput::new(InterfaceType::Image)],
            mount_dirs: Vec::new(),
        }
    }

    #[rstest::rstest]
    #[case(InvocationState::Idle)]
    #[case(InvocationState::ArgsBuilt)]
    #[case(InvocationState::Dispatched)]
    fn errors_settle_in_failed(#[case] reached: InvocationState) {
        let (state, outcome) = settle::<()>(reached, Err(PipelineError::validation("empty list")));
        assert_eq!(state, InvocationState::Failed);
        assert_eq!(outcome.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn success_after_dispatch_settles_in_completed() {
        let (state, outcome) = settle(InvocationState::Dispatched, Ok(3));
        assert_eq!(state, InvocationState::Completed);
        assert_eq!(outcome.unwrap(), 3);
    }

    #[test]
    fn success_without_dispatch_is_illegal() {
        let (state, outcome) = settle(InvocationState::ArgsBuilt, Ok(()));
        assert_eq!(state, InvocationState::Failed);
        assert!(matches!(outcome, Err(PipelineError::ContractViolation(_))));
    }

    #[tokio::test]
    async fn repeated_runs_load_the_artifact_once() {
        let fx = Fixture::new();
        let scan = fx.dicom("scan.dcm");

        fx.executor.run_op(ReadSegmentation::new(&scan)).await.unwrap();
        fx.executor.run_op(ReadSegmentation::new(&scan)).await.unwrap();

        assert_eq!(fx.loader.loads(), 1);
        assert!(fx.executor.cache().is_cached(ReadSegmentation::NAME));
    }

    #[tokio::test]
    async fn missing_input_fails_before_any_load() {
        let fx = Fixture::new();

        let err = fx
            .executor
            .run_op(ReadSegmentation::new(fx.dir.path().join("missing.dcm")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fx.loader.loads(), 0);
    }

    #[tokio::test]
    async fn file_removed_after_build_is_still_not_found() {
        let fx = Fixture::new();
        let scan = fx.dicom("scan.dcm");
        let invocation = ReadSegmentation::new(&scan).build().unwrap();
        std::fs::remove_file(&scan).unwrap();

        let err = fx.executor.run(ReadSegmentation::NAME, invocation).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fx.loader.loads(), 0);
    }

    #[tokio::test]
    async fn read_segmentation_returns_one_image() {
        let fx = Fixture::new();
        let scan = fx.dicom("scan.dcm");

        let image = fx
            .executor
            .run_op(ReadSegmentation::new(&scan).merge_segments(true))
            .await
            .unwrap();

        assert_eq!(image.size, vec![1, 1, 1]);
        let seen = fx.echo.seen_args.lock().unwrap();
        assert_eq!(seen[0].last().map(String::as_str), Some("--merge-segments"));
    }

    #[tokio::test]
    async fn read_parametric_map_returns_image_and_meta() {
        let fx = Fixture::new();
        let pmap = fx.dicom("pmap.dcm");

        let result = fx.executor.run_op(ReadParametricMap::new(&pmap)).await.unwrap();

        assert_eq!(result.param_image.image_type.component_type, ComponentType::UInt16);
        assert_eq!(result.meta_info, json!({"SeriesDescription": "ADC"}));
    }

    #[tokio::test]
    async fn write_parametric_map_writes_declared_file() {
        let fx = Fixture::new();
        let reference = fx.dicom("ref.dcm");
        let out = fx.dir.path().join("pmap.dcm");
        let image = Image::new(ImageType::scalar(3, ComponentType::Float32))
            .with_size(vec![1, 1, 1])
            .with_data(vec![0; 4]);

        let written = fx
            .executor
            .run_op(WriteParametricMap::new(image, json!({}), &out).ref_dicom_series([reference]))
            .await
            .unwrap();

        assert_eq!(written, out);
        assert_eq!(std::fs::read(&out).unwrap(), b"DICM");
    }

    #[tokio::test]
    async fn non_zero_return_value_surfaces_stderr() {
        let fx = Fixture::new();

        let err = fx
            .executor
            .run("always-fails", image_only_invocation())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Execution);
        match err {
            PipelineError::Execution { return_value, stderr, .. } => {
                assert_eq!(return_value, 2);
                assert_eq!(stderr, "could not parse DICOM");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn output_count_mismatch_is_a_contract_violation() {
        let fx = Fixture::new();
        let mut invocation = image_only_invocation();
        invocation.outputs.push(PipelineOutput::new(InterfaceType::JsonCompatible));

        let err = fx.executor.run("short", invocation).await.unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation(_)));
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[tokio::test]
    async fn output_kind_mismatch_is_a_contract_violation() {
        let fx = Fixture::new();
        let invocation = Invocation {
            outputs: vec![PipelineOutput::new(InterfaceType::JsonCompatible)],
            ..image_only_invocation()
        };

        let err = fx.executor.run("short", invocation).await.unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation(_)));
    }

    #[tokio::test]
    async fn unknown_pipeline_is_a_resource_error() {
        let fx = Fixture::new();
        let err = fx
            .executor
            .run("read-dicom-tags", image_only_invocation())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(!fx.executor.cache().is_cached("read-dicom-tags"));
    }

    #[tokio::test]
    async fn worker_and_handle_survive_a_failure() {
        let fx = Fixture::new();
        let scan = fx.dicom("scan.dcm");

        fx.executor.run("always-fails", image_only_invocation()).await.unwrap_err();
        fx.executor.run_op(ReadSegmentation::new(&scan)).await.unwrap();
        fx.executor.run_op(ReadSegmentation::new(&scan)).await.unwrap();

        let stats = fx.backend.stats().await;
        assert!(stats.worker_id.is_some());
        assert_eq!(stats.invocations, 3);
    }

    #[test]
    fn blocking_mode_runs_without_a_caller_runtime() {
        let fx = Fixture::new();
        let pmap = fx.dicom("pmap.dcm");

        let result = fx.executor.run_op_blocking(ReadParametricMap::new(&pmap)).unwrap();
        assert_eq!(result.meta_info["SeriesDescription"], "ADC");

        let outputs = fx
            .executor
            .run_blocking(ReadSegmentation::NAME, ReadSegmentation::new(&pmap).build().unwrap())
            .unwrap();
        assert_eq!(outputs.len(), 1);
    }

    #[tokio::test]
    async fn invalid_image_input_is_rejected_before_dispatch() {
        let fx = Fixture::new();
        // 1x1 画像に 3 バイトのデータ
        let image = Image::new(ImageType::scalar(2, ComponentType::UInt8))
            .with_size(vec![1, 1])
            .with_data(vec![0, 0, 0]);
        let invocation = Invocation {
            args: InvocationArgs::new(vec!["--memory-io".into(), "0".into(), "0".into()]),
            inputs: vec![PipelineInput::of(image)],
            outputs: vec![PipelineOutput::new(InterfaceType::Image)],
            mount_dirs: Vec::new(),
        };

        let err = fx.executor.run(ReadSegmentation::NAME, invocation).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fx.loader.loads(), 0);
    }
}
