use crate::{command::Command, context::CommandContext, handler::Handler};
use async_trait::async_trait;

/// 命令处理器
///
/// 一次调用可能因重试而被多次执行，命令以引用传入。
#[async_trait]
pub trait CommandHandler<C>: Handler
where
    C: Command,
{
    async fn handle(&self, ctx: &CommandContext, cmd: &C) -> anyhow::Result<C::Result>;
}
