//! Operation trait - 型付きの pipeline 操作
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`, `const OUTPUTS`)
//! - Associated Type (`type Output`) で結果の型を操作ごとに決める

use crate::domain::{InterfaceType, Invocation, PipelineError, PipelineOutput, TypedPayload};

/// Operation は論理名・引数の組み立て・出力のデコードを対応付ける
///
/// # 使用例
/// ```ignore
/// struct Downsample { image: Image, factor: u32 }
///
/// impl Operation for Downsample {
///     const NAME: &'static str = "downsample";
///     const OUTPUTS: &'static [InterfaceType] = &[InterfaceType::Image];
///     type Output = Image;
///
///     fn build(self) -> Result<Invocation, PipelineError> {
///         Ok(InvocationBuilder::new()
///             .input(self.image)
///             .output(InterfaceType::Image)?
///             .option_value("factor", self.factor)
///             .build())
///     }
///
///     fn decode(outputs: Vec<PipelineOutput>) -> Result<Image, PipelineError> {
///         let [image] = expect_payloads::<1>(outputs)?;
///         image.into_image()
///     }
/// }
/// ```
pub trait Operation: Send {
    /// Logical pipeline name, also the artifact name.
    const NAME: &'static str;

    /// Declared output kinds, in order.
    const OUTPUTS: &'static [InterfaceType];

    type Output: Send;

    fn build(self) -> Result<Invocation, PipelineError>;

    fn decode(outputs: Vec<PipelineOutput>) -> Result<Self::Output, PipelineError>;
}

/// Unwrap exactly `N` realized payloads from the outputs of a run.
pub fn expect_payloads<const N: usize>(
    outputs: Vec<PipelineOutput>,
) -> Result<[TypedPayload; N], PipelineError> {
    let count = outputs.len();
    let payloads = outputs
        .into_iter()
        .map(|output| {
            let kind = output.interface_type();
            output
                .into_data()
                .ok_or_else(|| PipelineError::contract(format!("{kind} output was not populated")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    payloads
        .try_into()
        .map_err(|_| PipelineError::contract(format!("expected {N} outputs, got {count}")))
}
