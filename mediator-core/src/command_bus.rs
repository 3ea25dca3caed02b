use crate::{command::Command, error::MediatorResult, processor::MessageProcessor};
use async_trait::async_trait;

/// 命令总线（Command Bus）
///
/// - 负责根据命令的具体类型路由到对应的处理器；
/// - 只暴露结果，不暴露请求 id 与模型状态（需要时使用 [`MessageProcessor::send`]）；
/// - 该 trait 带有泛型方法，通常以具体实现类型注入使用。
#[async_trait]
pub trait CommandBus: Send + Sync {
    /// 分发命令到对应处理器
    async fn dispatch<C>(&self, cmd: C) -> MediatorResult<C::Result>
    where
        C: Command;
}

#[async_trait]
impl CommandBus for MessageProcessor {
    async fn dispatch<C>(&self, cmd: C) -> MediatorResult<C::Result>
    where
        C: Command,
    {
        self.send(cmd).await.into_result()
    }
}
