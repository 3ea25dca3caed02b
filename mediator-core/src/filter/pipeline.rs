//! 过滤器管道
//!
//! 处理器过滤器按注册逆序折叠为一条续延链：
//! 前置钩子按注册顺序执行，后置钩子按逆序执行。
//!
use super::context::{ExceptionContext, ExecutedContext, ExecutingContext, Outcome};
use super::{ExceptionFilter, FilterKind, FilterRegistration, HandlerFilter};
use crate::descriptor::HandlerDescriptor;
use crate::error::FilterContractViolation;
use crate::property_bag::PropertyKey;
use crate::request::Request;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// 续延：执行链的剩余部分。外层 `Err` 为契约违规，绕过所有过滤器直接抛出
pub type Continuation<'a> =
    Box<dyn FnOnce() -> BoxFuture<'a, Result<Outcome, FilterContractViolation>> + Send + 'a>;

/// 描述符过滤器列表的分区结果
pub struct FilterPartition {
    source: Arc<[FilterRegistration]>,
    handler: Vec<Arc<dyn HandlerFilter>>,
    exception: Vec<Arc<dyn ExceptionFilter>>,
}

impl FilterPartition {
    fn build(source: Arc<[FilterRegistration]>) -> Self {
        let mut handler = Vec::new();
        let mut exception = Vec::new();
        for registration in source.iter() {
            match registration.kind() {
                FilterKind::Handler(f) => handler.push(f.clone()),
                FilterKind::Exception(f) => exception.push(f.clone()),
            }
        }
        Self {
            source,
            handler,
            exception,
        }
    }

    pub fn handler_filters(&self) -> &[Arc<dyn HandlerFilter>] {
        &self.handler
    }

    pub fn exception_filters(&self) -> &[Arc<dyn ExceptionFilter>] {
        &self.exception
    }
}

const PARTITION_KEY: &str = "filter.partition";

/// 取得描述符的过滤器分区；仅当过滤器列表的身份变化时重建
pub fn partition(descriptor: &HandlerDescriptor) -> Arc<FilterPartition> {
    let key = PropertyKey::of::<FilterPartition>(PARTITION_KEY);
    let current = descriptor.filters();

    if let Some(cached) = descriptor.properties().get::<FilterPartition>(&key) {
        if Arc::ptr_eq(&cached.source, &current) {
            return cached;
        }
    }

    debug!(
        handler = descriptor.handler_name(),
        filters = current.len(),
        "filter partition rebuilt"
    );
    let fresh = Arc::new(FilterPartition::build(current));
    descriptor.properties().insert(key, fresh.clone());
    fresh
}

/// 把过滤器折叠到 `inner` 之外，返回最外层续延
pub fn compose<'a>(
    filters: &'a [Arc<dyn HandlerFilter>],
    request: &Arc<Request>,
    descriptor: &Arc<HandlerDescriptor>,
    inner: Continuation<'a>,
) -> Continuation<'a> {
    filters.iter().rev().fold(inner, |next, filter| {
        let request = request.clone();
        let descriptor = descriptor.clone();
        let wrapped: Continuation<'a> =
            Box::new(move || run_filter(filter.as_ref(), request, descriptor, next).boxed());
        wrapped
    })
}

async fn run_filter(
    filter: &dyn HandlerFilter,
    request: Arc<Request>,
    descriptor: Arc<HandlerDescriptor>,
    next: Continuation<'_>,
) -> Result<Outcome, FilterContractViolation> {
    let mut executing = ExecutingContext::new(request.clone(), descriptor.clone());
    if let Err(fault) = filter.on_executing(&mut executing).await {
        return Ok(Err(fault));
    }
    if let Some(value) = executing.take_result() {
        debug!(handler = descriptor.handler_name(), "short-circuited by filter");
        return Ok(Ok(value));
    }

    let outcome = next().await?;

    let handler_name = descriptor.handler_name();
    let mut executed = ExecutedContext::new(request, descriptor, outcome);
    if let Err(fault) = filter.on_executed(&mut executed).await {
        return Ok(Err(fault));
    }
    executed.into_outcome().ok_or_else(|| {
        FilterContractViolation(format!(
            "a filter on {handler_name} left the outcome with neither a value nor a fault"
        ))
    })
}

/// 逆序执行异常过滤器：首个提供恢复值者终止链；否则原故障继续传播。
/// 异常过滤器自身的故障替换当前故障并终止链。
pub async fn run_exception_filters(
    filters: &[Arc<dyn ExceptionFilter>],
    request: Arc<Request>,
    descriptor: Arc<HandlerDescriptor>,
    fault: anyhow::Error,
) -> Outcome {
    let handler_name = descriptor.handler_name();
    let mut ctx = ExceptionContext::new(request, descriptor, fault);
    for filter in filters.iter().rev() {
        if let Err(fault) = filter.on_exception(&mut ctx).await {
            ctx.replace_fault(fault);
            break;
        }
        if ctx.is_handled() {
            debug!(handler = handler_name, "fault recovered by exception filter");
            break;
        }
    }
    ctx.into_outcome()
}
