//! 中介者统一错误定义
//!
//! - 配置类错误（未找到/歧义/生命周期冲突/重复注册）：同步返回，永不重试；
//! - 处理器故障以 `anyhow::Error` 承载，经过滤器链后原样透出；
//! - 激活失败统一收敛为 `HandlerCreation`；
//! - 过滤器契约违规属于缺陷，直接抛出，不经异常过滤器。
//!
use crate::model_state::ModelState;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MediatorError {
    #[error("no handler registered for command {command}")]
    NotFound { command: &'static str },

    #[error("ambiguous handlers for command {command}: {}", candidates.join(", "))]
    Ambiguous {
        command: &'static str,
        candidates: Vec<&'static str>,
    },

    #[error("invalid lifetime for handler {handler}: declared {declared:?}, requested {requested:?}")]
    InvalidLifetime {
        handler: &'static str,
        declared: crate::handler::Lifetime,
        requested: crate::handler::Lifetime,
    },

    #[error("handler already registered: command={command}, handler={handler}")]
    AlreadyRegistered {
        command: &'static str,
        handler: &'static str,
    },

    #[error("handler not found: command={command}, result={result}")]
    HandlerNotFound {
        command: &'static str,
        result: &'static str,
    },

    #[error("failed to create handler {handler}: {source}")]
    HandlerCreation {
        handler: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid command {command}: {} error(s)", model_state.error_count())]
    InvalidCommand {
        command: &'static str,
        model_state: ModelState,
    },

    #[error("filter contract violated: {0}")]
    FilterContract(String),

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("command canceled: {command}")]
    Canceled { command: &'static str },

    #[error(transparent)]
    Handler(anyhow::Error),
}

impl MediatorError {
    /// 是否属于配置类错误（构建期即可确定，不应重试）
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MediatorError::NotFound { .. }
                | MediatorError::Ambiguous { .. }
                | MediatorError::InvalidLifetime { .. }
                | MediatorError::AlreadyRegistered { .. }
        )
    }

    /// 取得处理器原始故障（若有）
    pub fn handler_fault(&self) -> Option<&anyhow::Error> {
        match self {
            MediatorError::Handler(err) => Some(err),
            _ => None,
        }
    }
}

/// 取消信号：在未执行任何尝试前被取消时返回
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation was canceled")]
pub struct Canceled;

/// 过滤器契约违规：缺陷，直接抛出
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FilterContractViolation(pub String);

impl From<FilterContractViolation> for MediatorError {
    fn from(err: FilterContractViolation) -> Self {
        MediatorError::FilterContract(err.0)
    }
}

pub type MediatorResult<T> = Result<T, MediatorError>;
