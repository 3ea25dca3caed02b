//! 中介者配置（MediatorConfig）
//!
//! 显式构建、由消息处理器以 `Arc` 持有；内部缓存（描述符映射、激活器、
//! 单例释放列表）随配置存续，不存在全局单例。
//!
use crate::activator::HandlerActivator;
use crate::catalog::{HandlerCatalog, HandlerTypeProvider};
use crate::command::Command;
use crate::descriptor::HandlerDescriptor;
use crate::error::MediatorResult;
use crate::filter::FilterRegistration;
use crate::request::DisposalList;
use crate::resolver::{DependencyResolver, NullDependencyResolver};
use crate::type_cache::HandlerTypeCache;
use crate::validation::ValidationEngine;
use bon::Builder;
use std::any::TypeId;
use std::sync::Arc;
use uuid::Uuid;

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::mediator_config_builder::{IsUnset, SetHandlers, State as BuilderState};

#[derive(Builder)]
pub struct MediatorConfig {
    /// 处理器类型发现
    handlers: Arc<dyn HandlerTypeProvider>,
    #[builder(default = null_resolver())]
    resolver: Arc<dyn DependencyResolver>,
    #[builder(default)]
    global_filters: Vec<FilterRegistration>,
    #[builder(default)]
    validation: ValidationEngine,
    /// 命令无效时是否中止（不调用处理器）
    #[builder(default = true)]
    abort_on_invalid_command: bool,

    #[builder(skip = Uuid::new_v4())]
    id: Uuid,
    #[builder(skip)]
    type_cache: HandlerTypeCache,
    #[builder(skip)]
    activator: HandlerActivator,
    #[builder(skip)]
    disposables: DisposalList,
}

fn null_resolver() -> Arc<dyn DependencyResolver> {
    Arc::new(NullDependencyResolver)
}

impl<S: BuilderState> MediatorConfigBuilder<S> {
    /// 以显式注册的目录作为处理器来源
    pub fn catalog(self, catalog: HandlerCatalog) -> MediatorConfigBuilder<SetHandlers<S>>
    where
        <S as BuilderState>::Handlers: IsUnset,
    {
        self.handlers(Arc::new(catalog))
    }
}

impl MediatorConfig {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn handlers(&self) -> &dyn HandlerTypeProvider {
        self.handlers.as_ref()
    }

    pub fn resolver(&self) -> &dyn DependencyResolver {
        self.resolver.as_ref()
    }

    pub fn global_filters(&self) -> &[FilterRegistration] {
        &self.global_filters
    }

    pub fn validation(&self) -> &ValidationEngine {
        &self.validation
    }

    pub fn abort_on_invalid_command(&self) -> bool {
        self.abort_on_invalid_command
    }

    pub fn activator(&self) -> &HandlerActivator {
        &self.activator
    }

    pub fn type_cache(&self) -> &HandlerTypeCache {
        &self.type_cache
    }

    /// 随配置存续的释放列表（单例处理器）
    pub fn disposables(&self) -> &DisposalList {
        &self.disposables
    }

    pub fn select_handler(&self, command_type: TypeId, command_name: &'static str) -> MediatorResult<Arc<HandlerDescriptor>> {
        self.type_cache.select_handler(self, command_type, command_name)
    }

    pub fn select_handler_for<C: Command>(&self) -> MediatorResult<Arc<HandlerDescriptor>> {
        self.select_handler(TypeId::of::<C>(), C::NAME)
    }
}

impl Drop for MediatorConfig {
    fn drop(&mut self) {
        self.disposables.drain();
    }
}
