//! 瞬时故障判定
//!
use thiserror::Error;

pub trait TransientErrorDetection: Send + Sync {
    fn is_transient(&self, error: &anyhow::Error) -> bool;
}

/// 任意故障都视为瞬时
#[derive(Clone, Copy, Debug, Default)]
pub struct TransientErrorCatchAll;

impl TransientErrorDetection for TransientErrorCatchAll {
    fn is_transient(&self, _error: &anyhow::Error) -> bool {
        true
    }
}

impl<F> TransientErrorDetection for F
where
    F: Fn(&anyhow::Error) -> bool + Send + Sync,
{
    fn is_transient(&self, error: &anyhow::Error) -> bool {
        self(error)
    }
}

/// 瞬时故障标记：处理器以它（或以它为上下文）报告可重试的故障
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transient fault: {0}")]
pub struct Transient(pub String);

impl Transient {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 仅带有 [`Transient`] 标记的故障视为瞬时
#[derive(Clone, Copy, Debug, Default)]
pub struct TransientMarkerDetection;

impl TransientErrorDetection for TransientMarkerDetection {
    fn is_transient(&self, error: &anyhow::Error) -> bool {
        error.downcast_ref::<Transient>().is_some() || error.chain().any(|cause| cause.is::<Transient>())
    }
}
