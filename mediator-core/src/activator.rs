//! 处理器激活（HandlerActivator）
//!
//! 先经根请求的依赖作用域向解析器索取；解析器提供的实例直接使用、不缓存、不释放。
//! 否则按生命周期：
//! - Singleton：激活器存续期间每个处理器类型一个，允许并发重复构建，保留先插入者；
//! - PerRequest：存放在根请求属性袋中，嵌套请求复用；
//! - Transient：单槽快速缓存记住最近一次的（描述符，工厂）；
//!   其他描述符或槽位争用时回落到其自身属性袋中的工厂，读写槽位均不阻塞。
//!
use crate::config::MediatorConfig;
use crate::descriptor::{ConstructFn, HandlerDescriptor, HandlerInstance};
use crate::error::{MediatorError, MediatorResult};
use crate::handler::Lifetime;
use crate::property_bag::PropertyKey;
use crate::request::Request;
use crate::resolver::DependencyScopeExt;
use dashmap::DashMap;
use std::any::{Any, TypeId, type_name};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::debug;

/// 处理器构造时可用的环境
pub struct Activation<'a> {
    config: &'a MediatorConfig,
    request: &'a Request,
    descriptor: &'a HandlerDescriptor,
}

impl<'a> Activation<'a> {
    pub fn new(config: &'a MediatorConfig, request: &'a Request, descriptor: &'a HandlerDescriptor) -> Self {
        Self {
            config,
            request,
            descriptor,
        }
    }

    pub fn config(&self) -> &'a MediatorConfig {
        self.config
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn descriptor(&self) -> &'a HandlerDescriptor {
        self.descriptor
    }

    /// 从根请求的依赖作用域解析服务
    pub fn resolve<T: Any + Send + Sync>(&self) -> anyhow::Result<Option<Arc<T>>> {
        self.request
            .dependency_scope(self.config.resolver())
            .resolve::<T>()
    }

    /// 解析必需的服务，缺失即为错误
    pub fn require<T: Any + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        self.resolve::<T>()?
            .ok_or_else(|| anyhow::anyhow!("required service {} is not registered", type_name::<T>()))
    }
}

/// 实例来源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// 由依赖解析器提供，归其作用域所有
    Resolver,
    /// 本次新建
    Created,
    /// 复用已缓存的实例
    Cached,
}

pub struct Activated {
    instance: HandlerInstance,
    origin: Origin,
    lifetime: Lifetime,
}

impl Activated {
    pub fn instance(&self) -> &HandlerInstance {
        &self.instance
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// 按生命周期登记释放：
    /// Singleton 随配置、PerRequest 随根请求（仅新建时），Transient 随当前请求；
    /// 解析器提供的实例不登记。
    pub fn register_for_dispose(&self, config: &MediatorConfig, request: &Request, descriptor: &HandlerDescriptor) {
        if self.origin != Origin::Created {
            return;
        }
        let instance = self.instance.clone();
        let dispose = descriptor.disposer();
        let release = move || dispose(&instance);
        match self.lifetime {
            Lifetime::Singleton => config.disposables().push(release),
            Lifetime::PerRequest => request.root().register_for_dispose(release),
            Lifetime::Transient => request.register_for_dispose(release),
        }
    }
}

type Factory = Arc<dyn Fn(&Activation<'_>) -> anyhow::Result<Option<HandlerInstance>> + Send + Sync>;

struct FastSlot {
    descriptor: Weak<HandlerDescriptor>,
    factory: Factory,
}

/// 描述符属性袋中缓存的工厂
struct DescriptorFactory(Factory);

const FACTORY_KEY: &str = "activator.factory";
const PER_REQUEST_KEY: &str = "activator.per_request";

#[derive(Default)]
pub struct HandlerActivator {
    singletons: DashMap<TypeId, HandlerInstance>,
    fast_slot: RwLock<Option<FastSlot>>,
    factories_built: AtomicUsize,
}

impl HandlerActivator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为请求创建（或取得）处理器实例；无法构造时返回 `Ok(None)`
    pub fn create_handler(
        &self,
        config: &MediatorConfig,
        request: &Request,
        descriptor: &Arc<HandlerDescriptor>,
    ) -> MediatorResult<Option<Activated>> {
        let creation_failed = |source: anyhow::Error| MediatorError::HandlerCreation {
            handler: descriptor.handler_name(),
            source,
        };

        let scope = request.dependency_scope(config.resolver());
        if let Some(instance) = scope
            .get_service(descriptor.handler_type(), descriptor.handler_name())
            .map_err(creation_failed)?
        {
            return Ok(Some(Activated {
                instance,
                origin: Origin::Resolver,
                lifetime: descriptor.lifetime(),
            }));
        }

        let activation = Activation::new(config, request, descriptor);
        let activated = match descriptor.lifetime() {
            Lifetime::Singleton => self.singleton(&activation, descriptor),
            Lifetime::PerRequest => per_request(&activation, descriptor),
            Lifetime::Transient => self.transient(&activation, descriptor),
        }
        .map_err(creation_failed)?;

        Ok(activated.map(|(instance, origin)| Activated {
            instance,
            origin,
            lifetime: descriptor.lifetime(),
        }))
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    fn singleton(
        &self,
        activation: &Activation<'_>,
        descriptor: &HandlerDescriptor,
    ) -> anyhow::Result<Option<(HandlerInstance, Origin)>> {
        let key = descriptor.handler_type();
        if let Some(existing) = self.singletons.get(&key) {
            return Ok(Some((existing.clone(), Origin::Cached)));
        }

        let Some(built) = descriptor.construct(activation)? else {
            return Ok(None);
        };
        let winner = self.singletons.entry(key).or_insert(built.clone()).clone();
        let origin = if Arc::ptr_eq(&winner, &built) {
            debug!(handler = descriptor.handler_name(), "singleton handler created");
            Origin::Created
        } else {
            Origin::Cached
        };
        Ok(Some((winner, origin)))
    }

    fn transient(
        &self,
        activation: &Activation<'_>,
        descriptor: &Arc<HandlerDescriptor>,
    ) -> anyhow::Result<Option<(HandlerInstance, Origin)>> {
        let factory = self.factory_for(descriptor);
        Ok(factory(activation)?.map(|instance| (instance, Origin::Created)))
    }

    /// 已在描述符属性袋中构建的工厂数
    pub fn factories_built(&self) -> usize {
        self.factories_built.load(Ordering::Relaxed)
    }

    fn factory_for(&self, descriptor: &Arc<HandlerDescriptor>) -> Factory {
        // 槽位被占用时不等待，直接走描述符属性袋
        if let Ok(slot) = self.fast_slot.try_read() {
            if let Some(slot) = slot.as_ref() {
                if slot.descriptor.upgrade().is_some_and(|d| Arc::ptr_eq(&d, descriptor)) {
                    return slot.factory.clone();
                }
            }
        }

        let key = PropertyKey::of::<DescriptorFactory>(FACTORY_KEY);
        let cached = descriptor.properties().get_or_insert_with(key, || {
            self.factories_built.fetch_add(1, Ordering::Relaxed);
            debug!(handler = descriptor.handler_name(), "transient factory built");
            DescriptorFactory(factory(descriptor.constructor()))
        });
        let factory = cached.0.clone();

        if let Ok(mut slot) = self.fast_slot.try_write() {
            *slot = Some(FastSlot {
                descriptor: Arc::downgrade(descriptor),
                factory: factory.clone(),
            });
        }
        factory
    }
}

fn factory(construct: ConstructFn) -> Factory {
    Arc::new(move |activation: &Activation<'_>| construct(activation))
}

fn per_request(
    activation: &Activation<'_>,
    descriptor: &HandlerDescriptor,
) -> anyhow::Result<Option<(HandlerInstance, Origin)>> {
    let root = activation.request().root();
    let key = PropertyKey::new(PER_REQUEST_KEY, descriptor.handler_type());
    if let Some(existing) = root.properties().get_raw(&key) {
        return Ok(Some((existing, Origin::Cached)));
    }

    let Some(built) = descriptor.construct(activation)? else {
        return Ok(None);
    };
    let winner = root.properties().insert_if_absent_raw(key, built.clone());
    let origin = if Arc::ptr_eq(&winner, &built) {
        Origin::Created
    } else {
        Origin::Cached
    };
    Ok(Some((winner, origin)))
}
