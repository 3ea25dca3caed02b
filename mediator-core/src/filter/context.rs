//! 过滤器上下文
//!
//! 处理结果以类型擦除的 [`Value`] 流经过滤器链；
//! 取值与改写按具体类型进行（值模式为命令的 `Result`，空模式为 `()`）。
//!
use crate::command::Command;
use crate::descriptor::HandlerDescriptor;
use crate::request::Request;
use std::any::Any;
use std::sync::Arc;

/// 类型擦除的处理结果
pub type Value = Box<dyn Any + Send>;

/// 一次调用的结局：值或故障
pub type Outcome = Result<Value, anyhow::Error>;

/// 前置钩子上下文
pub struct ExecutingContext {
    request: Arc<Request>,
    descriptor: Arc<HandlerDescriptor>,
    result: Option<Value>,
}

impl ExecutingContext {
    pub(crate) fn new(request: Arc<Request>, descriptor: Arc<HandlerDescriptor>) -> Self {
        Self {
            request,
            descriptor,
            result: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub fn command<C: Command>(&self) -> Option<&C> {
        self.request.command_as::<C>()
    }

    /// 设置结果即短路：跳过后续链与本过滤器的后置钩子
    pub fn set_result<T: Send + 'static>(&mut self, value: T) {
        self.result = Some(Box::new(value));
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub(crate) fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }
}

/// 后置钩子上下文
///
/// 钩子返回时结局必须仍为值或故障之一，取走而不放回属于契约违规。
pub struct ExecutedContext {
    request: Arc<Request>,
    descriptor: Arc<HandlerDescriptor>,
    outcome: Option<Outcome>,
}

impl ExecutedContext {
    pub(crate) fn new(request: Arc<Request>, descriptor: Arc<HandlerDescriptor>, outcome: Outcome) -> Self {
        Self {
            request,
            descriptor,
            outcome: Some(outcome),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub fn command<C: Command>(&self) -> Option<&C> {
        self.request.command_as::<C>()
    }

    pub fn value<T: 'static>(&self) -> Option<&T> {
        match &self.outcome {
            Some(Ok(value)) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn value_mut<T: 'static>(&mut self) -> Option<&mut T> {
        match &mut self.outcome {
            Some(Ok(value)) => value.downcast_mut::<T>(),
            _ => None,
        }
    }

    pub fn fault(&self) -> Option<&anyhow::Error> {
        match &self.outcome {
            Some(Err(fault)) => Some(fault),
            _ => None,
        }
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.outcome, Some(Err(_)))
    }

    /// 以新值替换结局（改写成功值或从故障中恢复）
    pub fn set_value<T: Send + 'static>(&mut self, value: T) {
        self.outcome = Some(Ok(Box::new(value)));
    }

    pub fn set_fault(&mut self, fault: anyhow::Error) {
        self.outcome = Some(Err(fault));
    }

    pub fn take_outcome(&mut self) -> Option<Outcome> {
        self.outcome.take()
    }

    pub fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }

    pub(crate) fn into_outcome(self) -> Option<Outcome> {
        self.outcome
    }
}

/// 异常过滤器上下文
pub struct ExceptionContext {
    request: Arc<Request>,
    descriptor: Arc<HandlerDescriptor>,
    fault: anyhow::Error,
    result: Option<Value>,
}

impl ExceptionContext {
    pub(crate) fn new(request: Arc<Request>, descriptor: Arc<HandlerDescriptor>, fault: anyhow::Error) -> Self {
        Self {
            request,
            descriptor,
            fault,
            result: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub fn fault(&self) -> &anyhow::Error {
        &self.fault
    }

    /// 提供恢复值；异常过滤器链随即停止
    pub fn set_result<T: Send + 'static>(&mut self, value: T) {
        self.result = Some(Box::new(value));
    }

    pub fn is_handled(&self) -> bool {
        self.result.is_some()
    }

    pub(crate) fn into_outcome(self) -> Outcome {
        match self.result {
            Some(value) => Ok(value),
            None => Err(self.fault),
        }
    }

    pub(crate) fn replace_fault(&mut self, fault: anyhow::Error) {
        self.fault = fault;
        self.result = None;
    }
}
