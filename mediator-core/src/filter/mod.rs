//! 过滤器（Filter）
//!
//! - [`HandlerFilter`]：前置/后置钩子，可短路、改写结果或从故障中恢复；
//! - [`ExceptionFilter`]：仅在调用最终故障时执行，可提供恢复值。
//!
//! 过滤器来自两个作用域：配置上的全局过滤器与处理器声明的处理器级过滤器，
//! 在构建描述符时合并一次。
//!
mod context;
mod pipeline;

pub use context::{ExceptionContext, ExecutedContext, ExecutingContext, Outcome, Value};
pub use pipeline::{
    Continuation, FilterPartition, compose, partition, run_exception_filters,
};

use async_trait::async_trait;
use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait HandlerFilter: Send + Sync {
    async fn on_executing(&self, ctx: &mut ExecutingContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    async fn on_executed(&self, ctx: &mut ExecutedContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }
}

#[async_trait]
pub trait ExceptionFilter: Send + Sync {
    async fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub enum FilterKind {
    Handler(Arc<dyn HandlerFilter>),
    Exception(Arc<dyn ExceptionFilter>),
}

/// 过滤器来源
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterScope {
    #[default]
    Global,
    Handler,
}

/// 一条过滤器注册
///
/// 默认允许同类型多次出现；`single()` 之后同类型仅保留最后一条
/// （处理器级覆盖全局）。
#[derive(Clone)]
pub struct FilterRegistration {
    kind: FilterKind,
    filter_type: TypeId,
    filter_name: &'static str,
    order: i32,
    allow_multiple: bool,
    scope: FilterScope,
}

impl FilterRegistration {
    pub fn handler<F: HandlerFilter + 'static>(filter: F) -> Self {
        Self::from_kind::<F>(FilterKind::Handler(Arc::new(filter)))
    }

    pub fn exception<F: ExceptionFilter + 'static>(filter: F) -> Self {
        Self::from_kind::<F>(FilterKind::Exception(Arc::new(filter)))
    }

    fn from_kind<F: 'static>(kind: FilterKind) -> Self {
        Self {
            kind,
            filter_type: TypeId::of::<F>(),
            filter_name: type_name::<F>(),
            order: 0,
            allow_multiple: true,
            scope: FilterScope::Global,
        }
    }

    /// 排序值，越小越靠外；同值保持注册顺序
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn single(mut self) -> Self {
        self.allow_multiple = false;
        self
    }

    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    pub fn filter_type(&self) -> TypeId {
        self.filter_type
    }

    pub fn filter_name(&self) -> &'static str {
        self.filter_name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn allow_multiple(&self) -> bool {
        self.allow_multiple
    }

    pub fn scope(&self) -> FilterScope {
        self.scope
    }

    fn in_scope(mut self, scope: FilterScope) -> Self {
        self.scope = scope;
        self
    }
}

impl fmt::Debug for FilterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FilterKind::Handler(_) => "handler",
            FilterKind::Exception(_) => "exception",
        };
        f.debug_struct("FilterRegistration")
            .field("filter", &self.filter_name)
            .field("kind", &kind)
            .field("order", &self.order)
            .field("allow_multiple", &self.allow_multiple)
            .field("scope", &self.scope)
            .finish()
    }
}

/// 合并全局与处理器级过滤器
///
/// 先全局、后处理器；不允许多次出现的类型由后出现者替换先出现者；
/// 最后按 `order` 稳定排序。
pub fn merge_filters(global: &[FilterRegistration], handler: &[FilterRegistration]) -> Vec<FilterRegistration> {
    let mut merged: Vec<FilterRegistration> = Vec::with_capacity(global.len() + handler.len());

    let scoped = global
        .iter()
        .map(|r| r.clone().in_scope(FilterScope::Global))
        .chain(handler.iter().map(|r| r.clone().in_scope(FilterScope::Handler)));

    for registration in scoped {
        if !registration.allow_multiple {
            merged.retain(|existing| existing.filter_type != registration.filter_type);
        }
        merged.push(registration);
    }

    merged.sort_by_key(|r| r.order);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Audit;
    #[async_trait]
    impl HandlerFilter for Audit {}

    struct Timing;
    #[async_trait]
    impl HandlerFilter for Timing {}

    struct Fallback;
    #[async_trait]
    impl ExceptionFilter for Fallback {
        async fn on_exception(&self, _ctx: &mut ExceptionContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn names(list: &[FilterRegistration]) -> Vec<(&'static str, FilterScope)> {
        list.iter()
            .map(|r| (r.filter_name().rsplit("::").next().unwrap_or_default(), r.scope()))
            .collect()
    }

    #[test]
    fn handler_scope_overrides_single_global() {
        let global = vec![
            FilterRegistration::handler(Audit).single(),
            FilterRegistration::handler(Timing),
        ];
        let handler = vec![FilterRegistration::handler(Audit).single()];

        let merged = merge_filters(&global, &handler);
        assert_eq!(
            names(&merged),
            vec![("Timing", FilterScope::Global), ("Audit", FilterScope::Handler)]
        );
    }

    #[test]
    fn multiple_allowed_filters_are_kept() {
        let global = vec![FilterRegistration::handler(Timing)];
        let handler = vec![FilterRegistration::handler(Timing)];
        assert_eq!(merge_filters(&global, &handler).len(), 2);
    }

    #[test]
    fn order_is_stable_sort() {
        let global = vec![
            FilterRegistration::handler(Audit).with_order(5),
            FilterRegistration::exception(Fallback),
            FilterRegistration::handler(Timing).with_order(-1),
        ];
        let merged = merge_filters(&global, &[]);
        assert_eq!(
            merged.iter().map(|r| r.order()).collect::<Vec<_>>(),
            vec![-1, 0, 5]
        );
    }
}
