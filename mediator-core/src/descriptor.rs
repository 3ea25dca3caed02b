//! 处理器描述符（HandlerDescriptor）
//!
//! 构建后不可变的（配置，命令类型，处理器类型）三元组：
//! 预先绑定值调用与空调用两个入口、结果类型、生命周期、重试策略、
//! 合并后的过滤器列表，以及按身份作用域缓存使用的属性袋。
//!
use crate::activator::Activation;
use crate::catalog::{CommandBinding, HandlerType};
use crate::command::Command;
use crate::command_handler::CommandHandler;
use crate::context::CommandContext;
use crate::error::MediatorError;
use crate::filter::{FilterRegistration, Value, merge_filters};
use crate::handler::{Handler, Lifetime};
use crate::property_bag::PropertyBag;
use crate::retry::RetryPolicy;
use crate::validation::{AsAny, Validate};
use crate::worker::InvokeMode;
use futures_util::future::BoxFuture;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// 类型擦除的处理器实例
pub type HandlerInstance = Arc<dyn Any + Send + Sync>;

pub type InvokeFn =
    for<'a> fn(&'a HandlerInstance, &'a CommandContext, &'a dyn Validate) -> BoxFuture<'a, anyhow::Result<Value>>;

pub type ConstructFn = fn(&Activation<'_>) -> anyhow::Result<Option<HandlerInstance>>;

pub type DisposeFn = fn(&HandlerInstance);

pub(crate) fn invoke_value<'a, C, H>(
    instance: &'a HandlerInstance,
    ctx: &'a CommandContext,
    command: &'a dyn Validate,
) -> BoxFuture<'a, anyhow::Result<Value>>
where
    C: Command,
    H: CommandHandler<C>,
{
    Box::pin(async move {
        let (handler, cmd) = bind::<C, H>(instance, command)?;
        let value = handler.handle(ctx, cmd).await?;
        Ok(Box::new(value) as Value)
    })
}

pub(crate) fn invoke_void<'a, C, H>(
    instance: &'a HandlerInstance,
    ctx: &'a CommandContext,
    command: &'a dyn Validate,
) -> BoxFuture<'a, anyhow::Result<Value>>
where
    C: Command,
    H: CommandHandler<C>,
{
    Box::pin(async move {
        let (handler, cmd) = bind::<C, H>(instance, command)?;
        handler.handle(ctx, cmd).await?;
        Ok(Box::new(()) as Value)
    })
}

fn bind<'a, C, H>(instance: &'a HandlerInstance, command: &'a dyn Validate) -> Result<(&'a H, &'a C), MediatorError>
where
    C: Command,
    H: CommandHandler<C>,
{
    let handler = instance
        .downcast_ref::<H>()
        .ok_or(MediatorError::TypeMismatch {
            expected: type_name::<H>(),
            found: "handler instance",
        })?;
    let cmd = AsAny::as_any(command)
        .downcast_ref::<C>()
        .ok_or(MediatorError::TypeMismatch {
            expected: C::NAME,
            found: "command",
        })?;
    Ok((handler, cmd))
}

pub(crate) fn construct<H: Handler>(activation: &Activation<'_>) -> anyhow::Result<Option<HandlerInstance>> {
    Ok(H::create(activation)?.map(|handler| Arc::new(handler) as HandlerInstance))
}

pub(crate) fn dispose<H: Handler>(instance: &HandlerInstance) {
    if let Some(handler) = instance.downcast_ref::<H>() {
        handler.dispose();
    }
}

pub struct HandlerDescriptor {
    config_id: Uuid,
    command_type: TypeId,
    command_name: &'static str,
    handler_type: TypeId,
    handler_name: &'static str,
    result_type: TypeId,
    result_name: &'static str,
    lifetime: Lifetime,
    retry: Option<RetryPolicy>,
    filters: RwLock<Arc<[FilterRegistration]>>,
    construct: ConstructFn,
    invoke: InvokeFn,
    invoke_void: InvokeFn,
    dispose: DisposeFn,
    properties: PropertyBag,
}

impl HandlerDescriptor {
    pub(crate) fn new(
        config_id: Uuid,
        global_filters: &[FilterRegistration],
        handler: &HandlerType,
        binding: &CommandBinding,
    ) -> Self {
        let filters: Arc<[FilterRegistration]> = merge_filters(global_filters, handler.filters()).into();
        Self {
            config_id,
            command_type: binding.command_type(),
            command_name: binding.command_name(),
            handler_type: handler.handler_type(),
            handler_name: handler.handler_name(),
            result_type: binding.result_type(),
            result_name: binding.result_name(),
            lifetime: handler.lifetime(),
            retry: handler.retry().cloned(),
            filters: RwLock::new(filters),
            construct: handler.constructor(),
            invoke: binding.invoker(InvokeMode::Value),
            invoke_void: binding.invoker(InvokeMode::Void),
            dispose: handler.disposer(),
            properties: PropertyBag::new(),
        }
    }

    pub fn config_id(&self) -> Uuid {
        self.config_id
    }

    pub fn command_type(&self) -> TypeId {
        self.command_type
    }

    pub fn command_name(&self) -> &'static str {
        self.command_name
    }

    pub fn handler_type(&self) -> TypeId {
        self.handler_type
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub fn result_type(&self) -> TypeId {
        self.result_type
    }

    pub fn result_name(&self) -> &'static str {
        self.result_name
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// 当前过滤器列表（身份稳定，直到被替换）
    pub fn filters(&self) -> Arc<[FilterRegistration]> {
        self.filters.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 替换过滤器列表；缓存的过滤器分区在下次使用时重建
    pub fn replace_filters(&self, filters: Vec<FilterRegistration>) {
        let fresh: Arc<[FilterRegistration]> = filters.into();
        *self.filters.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn invoker(&self, mode: InvokeMode) -> InvokeFn {
        match mode {
            InvokeMode::Value => self.invoke,
            InvokeMode::Void => self.invoke_void,
        }
    }

    pub(crate) fn construct(&self, activation: &Activation<'_>) -> anyhow::Result<Option<HandlerInstance>> {
        (self.construct)(activation)
    }

    pub(crate) fn constructor(&self) -> ConstructFn {
        self.construct
    }

    pub(crate) fn disposer(&self) -> DisposeFn {
        self.dispose
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("command", &self.command_name)
            .field("handler", &self.handler_name)
            .field("result", &self.result_name)
            .field("lifetime", &self.lifetime)
            .field("retry", &self.retry)
            .field("filters", &self.filters())
            .finish()
    }
}
