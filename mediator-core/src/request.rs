//! 请求（Request）
//!
//! 一次分发尝试：命令实例、唯一 id、可选父请求（嵌套分发）、
//! 由根请求持有的惰性依赖作用域、释放列表、属性袋、取消令牌与模型状态。
//!
use crate::command::Command;
use crate::model_state::ModelState;
use crate::property_bag::PropertyBag;
use crate::resolver::{DependencyResolver, DependencyScope};
use crate::validation::{AsAny, Validate};
use std::any::TypeId;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type Disposal = Box<dyn FnOnce() + Send>;

/// 释放列表：结束时按注册的逆序执行
#[derive(Default)]
pub struct DisposalList {
    items: Mutex<Vec<Disposal>>,
}

impl DisposalList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, dispose: impl FnOnce() + Send + 'static) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(dispose));
    }

    /// 取出全部条目并逆序执行（不持锁），返回执行数量
    pub fn drain(&self) -> usize {
        let items = std::mem::take(&mut *self.items.lock().unwrap_or_else(PoisonError::into_inner));
        let count = items.len();
        for dispose in items.into_iter().rev() {
            dispose();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Request {
    id: Uuid,
    command: Box<dyn Validate>,
    command_type: TypeId,
    command_name: &'static str,
    parent: Option<Arc<Request>>,
    scope: OnceLock<Arc<dyn DependencyScope>>,
    properties: PropertyBag,
    model_state: Mutex<ModelState>,
    disposables: DisposalList,
    cancellation: CancellationToken,
}

impl Request {
    /// 根请求
    pub fn new<C: Command>(command: C) -> Self {
        Self::build(command, None, CancellationToken::new())
    }

    /// 子请求：继承父请求的取消信号
    pub fn child<C: Command>(command: C, parent: &Arc<Request>) -> Self {
        let token = parent.cancellation.child_token();
        Self::build(command, Some(parent.clone()), token)
    }

    /// 替换取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    fn build<C: Command>(command: C, parent: Option<Arc<Request>>, cancellation: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: Box::new(command),
            command_type: TypeId::of::<C>(),
            command_name: C::NAME,
            parent,
            scope: OnceLock::new(),
            properties: PropertyBag::new(),
            model_state: Mutex::new(ModelState::new()),
            disposables: DisposalList::new(),
            cancellation,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn parent(&self) -> Option<&Arc<Request>> {
        self.parent.as_ref()
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.parent.as_ref().map(|p| p.id)
    }

    /// 父链的根（自身无父请求时即为自身）
    pub fn root(&self) -> &Request {
        let mut current = self;
        while let Some(parent) = &current.parent {
            current = parent;
        }
        current
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn command(&self) -> &dyn Validate {
        self.command.as_ref()
    }

    pub fn command_type(&self) -> TypeId {
        self.command_type
    }

    pub fn command_name(&self) -> &'static str {
        self.command_name
    }

    pub fn command_as<C: Command>(&self) -> Option<&C> {
        AsAny::as_any(self.command.as_ref()).downcast_ref::<C>()
    }

    /// 根请求持有的依赖作用域，首次访问时创建
    pub fn dependency_scope(&self, resolver: &dyn DependencyResolver) -> Arc<dyn DependencyScope> {
        self.root()
            .scope
            .get_or_init(|| resolver.begin_scope())
            .clone()
    }

    pub fn has_dependency_scope(&self) -> bool {
        self.root().scope.get().is_some()
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn model_state_mut(&self) -> MutexGuard<'_, ModelState> {
        self.model_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 模型状态快照
    pub fn model_state(&self) -> ModelState {
        self.model_state_mut().clone()
    }

    pub fn disposables(&self) -> &DisposalList {
        &self.disposables
    }

    pub fn register_for_dispose(&self, dispose: impl FnOnce() + Send + 'static) {
        self.disposables.push(dispose);
    }

    /// 结束请求：逆序执行释放列表；可重复调用
    pub fn end(&self) {
        let disposed = self.disposables.drain();
        if disposed > 0 {
            tracing::debug!(request_id = %self.id, disposed, "request ended");
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        self.end();
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("command", &self.command_name)
            .field("parent", &self.parent_id())
            .finish()
    }
}
