use crate::command::Command;
use crate::error::MediatorResult;
use crate::model_state::ModelState;
use crate::processor::{MessageProcessor, SendOptions};
use crate::property_bag::PropertyBag;
use crate::request::Request;
use crate::resolver::DependencyScopeExt;
use crate::response::Response;
use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 命令上下文（Command Context）
///
/// 处理器执行期间可见的横切信息：
/// - 当前请求（id、父请求、属性袋、模型状态）；
/// - 取消信号（随根请求传递，子请求使用子令牌）；
/// - 嵌套分发：经由 `send`/`post` 发出的命令成为当前请求的子请求，
///   共享根请求的依赖作用域与 PerRequest 处理器。
///
/// 典型用法：
/// ```rust,ignore
/// async fn handle(&self, ctx: &CommandContext, cmd: &PlaceOrder) -> anyhow::Result<OrderId> {
///     let stock = ctx.send(ReserveStock { sku: cmd.sku.clone() }).await?;
///     Ok(OrderId::new(stock))
/// }
/// ```
#[derive(Clone)]
pub struct CommandContext {
    request: Arc<Request>,
    processor: MessageProcessor,
}

impl CommandContext {
    pub(crate) fn new(request: Arc<Request>, processor: MessageProcessor) -> Self {
        Self { request, processor }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn request_id(&self) -> Uuid {
        self.request.id()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.request.cancellation()
    }

    pub fn is_cancelled(&self) -> bool {
        self.request.is_cancelled()
    }

    pub fn properties(&self) -> &PropertyBag {
        self.request.properties()
    }

    pub fn model_state(&self) -> ModelState {
        self.request.model_state()
    }

    pub fn processor(&self) -> &MessageProcessor {
        &self.processor
    }

    /// 从根请求的依赖作用域解析服务
    pub fn resolve<T: Any + Send + Sync>(&self) -> anyhow::Result<Option<Arc<T>>> {
        self.request
            .dependency_scope(self.processor.config().resolver())
            .resolve::<T>()
    }

    /// 以子请求分发命令并取得结果
    pub async fn send<C: Command>(&self, cmd: C) -> MediatorResult<C::Result> {
        self.send_response(cmd).await.into_result()
    }

    /// 以子请求分发命令，返回完整响应
    pub async fn send_response<C: Command>(&self, cmd: C) -> Response<C::Result> {
        let options = SendOptions::builder().parent(self.request.clone()).build();
        self.processor.send_with(cmd, options).await
    }

    /// 以子请求分发命令，忽略结果值
    pub async fn post<C: Command>(&self, cmd: C) -> MediatorResult<()> {
        let options = SendOptions::builder().parent(self.request.clone()).build();
        self.processor.post_with(cmd, options).await.into_result()
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("request", &self.request)
            .finish()
    }
}
