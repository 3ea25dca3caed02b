//! 处理器目录（HandlerCatalog）
//!
//! 显式注册代替运行期反射：每个处理器类型登记一次，可绑定多个命令类型，
//! 所有绑定共享该处理器类型的生命周期。
//!
use crate::command::Command;
use crate::command_handler::CommandHandler;
use crate::descriptor::{self, ConstructFn, DisposeFn, InvokeFn};
use crate::error::{MediatorError, MediatorResult};
use crate::filter::FilterRegistration;
use crate::handler::{Handler, Lifetime};
use crate::retry::RetryPolicy;
use crate::worker::InvokeMode;
use std::any::{TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;

/// 处理器类型发现
pub trait HandlerTypeProvider: Send + Sync {
    fn discover_handler_types(&self) -> Vec<HandlerType>;
}

/// 一个命令类型到处理器的绑定
#[derive(Clone)]
pub struct CommandBinding {
    command_type: TypeId,
    command_name: &'static str,
    result_type: TypeId,
    result_name: &'static str,
    invoke: InvokeFn,
    invoke_void: InvokeFn,
}

impl CommandBinding {
    pub fn of<C, H>() -> Self
    where
        C: Command,
        H: CommandHandler<C>,
    {
        Self {
            command_type: TypeId::of::<C>(),
            command_name: C::NAME,
            result_type: TypeId::of::<C::Result>(),
            result_name: type_name::<C::Result>(),
            invoke: descriptor::invoke_value::<C, H>,
            invoke_void: descriptor::invoke_void::<C, H>,
        }
    }

    pub fn command_type(&self) -> TypeId {
        self.command_type
    }

    pub fn command_name(&self) -> &'static str {
        self.command_name
    }

    pub fn result_type(&self) -> TypeId {
        self.result_type
    }

    pub fn result_name(&self) -> &'static str {
        self.result_name
    }

    pub fn invoker(&self, mode: InvokeMode) -> InvokeFn {
        match mode {
            InvokeMode::Value => self.invoke,
            InvokeMode::Void => self.invoke_void,
        }
    }
}

impl fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBinding")
            .field("command", &self.command_name)
            .field("result", &self.result_name)
            .finish()
    }
}

/// 一个处理器类型及其声明（生命周期、重试、过滤器）与命令绑定
#[derive(Clone)]
pub struct HandlerType {
    handler_type: TypeId,
    handler_name: &'static str,
    lifetime: Lifetime,
    retry: Option<RetryPolicy>,
    filters: Vec<FilterRegistration>,
    construct: ConstructFn,
    dispose: DisposeFn,
    bindings: Vec<CommandBinding>,
}

impl HandlerType {
    /// 读取处理器声明；返回的构建器只接受 `H` 自身实现的命令绑定
    pub fn of<H: Handler>() -> HandlerTypeBuilder<H> {
        HandlerTypeBuilder {
            inner: Self {
                handler_type: TypeId::of::<H>(),
                handler_name: type_name::<H>(),
                lifetime: H::lifetime(),
                retry: H::retry(),
                filters: H::filters(),
                construct: descriptor::construct::<H>,
                dispose: descriptor::dispose::<H>,
                bindings: Vec::new(),
            },
            _handler: PhantomData,
        }
    }

    pub fn handler_type(&self) -> TypeId {
        self.handler_type
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn filters(&self) -> &[FilterRegistration] {
        &self.filters
    }

    pub fn bindings(&self) -> &[CommandBinding] {
        &self.bindings
    }

    pub(crate) fn constructor(&self) -> ConstructFn {
        self.construct
    }

    pub(crate) fn disposer(&self) -> DisposeFn {
        self.dispose
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("handler", &self.handler_name)
            .field("lifetime", &self.lifetime)
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// 绑定到具体处理器类型的构建器
pub struct HandlerTypeBuilder<H> {
    inner: HandlerType,
    _handler: PhantomData<fn() -> H>,
}

impl<H: Handler> HandlerTypeBuilder<H> {
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.inner.lifetime = lifetime;
        self
    }

    pub fn bind<C>(mut self) -> Self
    where
        C: Command,
        H: CommandHandler<C>,
    {
        self.inner.bindings.push(CommandBinding::of::<C, H>());
        self
    }

    pub fn build(self) -> HandlerType {
        self.inner
    }
}

impl<H: Handler> From<HandlerTypeBuilder<H>> for HandlerType {
    fn from(builder: HandlerTypeBuilder<H>) -> Self {
        builder.build()
    }
}

/// 显式注册的处理器目录
#[derive(Clone, Debug, Default)]
pub struct HandlerCatalog {
    types: Vec<HandlerType>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以处理器声明的生命周期注册
    pub fn register<C, H>(&mut self) -> MediatorResult<&mut Self>
    where
        C: Command,
        H: CommandHandler<C>,
    {
        self.register_with_lifetime::<C, H>(H::lifetime())
    }

    /// 以指定生命周期注册；同一处理器类型的所有绑定必须使用相同生命周期
    pub fn register_with_lifetime<C, H>(&mut self, lifetime: Lifetime) -> MediatorResult<&mut Self>
    where
        C: Command,
        H: CommandHandler<C>,
    {
        let handler_type = TypeId::of::<H>();
        let index = match self.types.iter().position(|t| t.handler_type == handler_type) {
            Some(index) => {
                let declared = self.types[index].lifetime;
                if declared != lifetime {
                    return Err(MediatorError::InvalidLifetime {
                        handler: type_name::<H>(),
                        declared,
                        requested: lifetime,
                    });
                }
                index
            }
            None => {
                self.types.push(HandlerType::of::<H>().with_lifetime(lifetime).build());
                self.types.len() - 1
            }
        };

        let entry = &mut self.types[index];
        if entry.bindings.iter().any(|b| b.command_type == TypeId::of::<C>()) {
            return Err(MediatorError::AlreadyRegistered {
                command: C::NAME,
                handler: type_name::<H>(),
            });
        }
        entry.bindings.push(CommandBinding::of::<C, H>());
        tracing::debug!(command = C::NAME, handler = type_name::<H>(), ?lifetime, "handler registered");
        Ok(self)
    }

    pub fn handler_types(&self) -> &[HandlerType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl HandlerTypeProvider for HandlerCatalog {
    fn discover_handler_types(&self) -> Vec<HandlerType> {
        self.types.clone()
    }
}

impl<F> HandlerTypeProvider for F
where
    F: Fn() -> Vec<HandlerType> + Send + Sync,
{
    fn discover_handler_types(&self) -> Vec<HandlerType> {
        self()
    }
}
