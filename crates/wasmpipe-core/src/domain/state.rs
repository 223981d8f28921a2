//! State - 1 回の呼び出しの状態
//!
//! # 状態遷移
//! - Idle → ArgsBuilt → Dispatched → Completed | Failed
//! - Idle / ArgsBuilt からも Failed へ遷移できる（dispatch 前の検証失敗）
//! - Completed / Failed は終端（リトライなし）

use super::errors::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationState {
    Idle,
    ArgsBuilt,
    Dispatched,
    Completed,
    Failed,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Idle, ArgsBuilt)
                | (ArgsBuilt, Dispatched)
                | (Dispatched, Completed)
                | (Idle, Failed)
                | (ArgsBuilt, Failed)
                | (Dispatched, Failed)
        )
    }

    pub fn transition(self, next: InvocationState) -> Result<InvocationState, PipelineError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PipelineError::contract(format!(
                "illegal invocation state transition {self:?} -> {next:?}"
            )))
        }
    }
}
