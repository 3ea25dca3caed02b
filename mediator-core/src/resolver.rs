//! 依赖解析（DependencyResolver）
//!
//! 中介者只消费该抽象：按类型取服务、开启作用域。
//! 作用域由根请求惰性创建并在其整个请求链上共享。
//!
use dashmap::DashMap;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

/// 类型擦除后的服务实例
pub type Service = Arc<dyn Any + Send + Sync>;

/// 依赖作用域：一次根请求内的服务视图
pub trait DependencyScope: Send + Sync {
    fn get_service(&self, service: TypeId, name: &'static str) -> anyhow::Result<Option<Service>>;
}

/// 依赖解析器
pub trait DependencyResolver: Send + Sync {
    fn get_service(&self, service: TypeId, name: &'static str) -> anyhow::Result<Option<Service>>;

    fn begin_scope(&self) -> Arc<dyn DependencyScope>;
}

/// 便捷的类型化解析
pub trait DependencyScopeExt {
    fn resolve<T: Any + Send + Sync>(&self) -> anyhow::Result<Option<Arc<T>>>;
}

impl<S: DependencyScope + ?Sized> DependencyScopeExt for S {
    fn resolve<T: Any + Send + Sync>(&self) -> anyhow::Result<Option<Arc<T>>> {
        match self.get_service(TypeId::of::<T>(), type_name::<T>())? {
            Some(service) => service.downcast::<T>().map(Some).map_err(|_| {
                anyhow::anyhow!("service registered for {} has a different type", type_name::<T>())
            }),
            None => Ok(None),
        }
    }
}

/// 空解析器：永远返回 None（默认配置）
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDependencyResolver;

impl DependencyScope for NullDependencyResolver {
    fn get_service(&self, _service: TypeId, _name: &'static str) -> anyhow::Result<Option<Service>> {
        Ok(None)
    }
}

impl DependencyResolver for NullDependencyResolver {
    fn get_service(&self, _service: TypeId, _name: &'static str) -> anyhow::Result<Option<Service>> {
        Ok(None)
    }

    fn begin_scope(&self) -> Arc<dyn DependencyScope> {
        Arc::new(NullDependencyResolver)
    }
}

/// 基于内存映射的简单解析器
/// - 注册的实例在所有作用域之间共享；
/// - `begin_scope` 返回映射的共享视图。
#[derive(Clone, Default)]
pub struct ServiceMap {
    services: Arc<DashMap<TypeId, Service>>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&self, service: Arc<T>) -> &Self {
        self.services.insert(TypeId::of::<T>(), service);
        self
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl DependencyScope for ServiceMap {
    fn get_service(&self, service: TypeId, _name: &'static str) -> anyhow::Result<Option<Service>> {
        Ok(self.services.get(&service).map(|s| s.clone()))
    }
}

impl DependencyResolver for ServiceMap {
    fn get_service(&self, service: TypeId, name: &'static str) -> anyhow::Result<Option<Service>> {
        DependencyScope::get_service(self, service, name)
    }

    fn begin_scope(&self) -> Arc<dyn DependencyScope> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock(u64);

    #[test]
    fn service_map_resolves_registered_types() {
        let map = ServiceMap::new();
        map.insert(Arc::new(Clock(7)));

        let scope = map.begin_scope();
        let clock = scope.resolve::<Clock>().unwrap().unwrap();
        assert_eq!(clock.0, 7);
        assert!(scope.resolve::<String>().unwrap().is_none());
    }

    #[test]
    fn null_resolver_never_supplies() {
        let scope = NullDependencyResolver.begin_scope();
        assert!(scope.resolve::<Clock>().unwrap().is_none());
    }
}
