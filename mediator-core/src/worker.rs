//! 命令执行器（CommandWorker）
//!
//! 每次分发的固定顺序：
//! 0. 已取消 → `Canceled`，不调用任何过滤器与处理器；
//! 1. 选择描述符；
//! 2. 激活处理器，无实例 → `HandlerNotFound`；
//! 3. 按生命周期登记释放；
//! 4. 校验命令，无效且配置为中止 → 带模型状态返回，不调用处理器；
//! 5. 构建调用上下文；
//! 6. 以处理器过滤器链包裹处理器调用（重试仅包裹处理器调用本身）；
//! 7. 执行；
//! 8. 故障时执行异常过滤器链；
//! 9. 转换为最终结果。
//!
use crate::activator::Activated;
use crate::context::CommandContext;
use crate::descriptor::HandlerDescriptor;
use crate::error::{Canceled, FilterContractViolation, MediatorError, MediatorResult};
use crate::filter::{self, Continuation, Outcome, Value};
use crate::processor::MessageProcessor;
use crate::request::Request;
use futures_util::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// 调用方式：取值，或仅执行
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeMode {
    Value,
    Void,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CommandWorker;

impl CommandWorker {
    pub async fn execute(
        &self,
        processor: &MessageProcessor,
        request: Arc<Request>,
        mode: InvokeMode,
    ) -> MediatorResult<Value> {
        let config = processor.config();
        let command = request.command_name();

        if request.is_cancelled() {
            return Err(MediatorError::Canceled { command });
        }

        let descriptor = config.select_handler(request.command_type(), command)?;

        let Some(activated) = config.activator().create_handler(config, &request, &descriptor)? else {
            return Err(MediatorError::HandlerNotFound {
                command,
                result: match mode {
                    InvokeMode::Value => descriptor.result_name(),
                    InvokeMode::Void => "()",
                },
            });
        };
        activated.register_for_dispose(config, &request, &descriptor);

        if !config.validation().validate(&request) && config.abort_on_invalid_command() {
            debug!(command, "command rejected by validation");
            return Err(MediatorError::InvalidCommand {
                command,
                model_state: request.model_state(),
            });
        }

        let ctx = CommandContext::new(request.clone(), processor.clone());
        let partition = filter::partition(&descriptor);

        let invocation: Continuation<'_> = {
            let (request, descriptor, activated, ctx) = (&request, &descriptor, &activated, &ctx);
            Box::new(move || {
                invoke(request, descriptor, activated, ctx, mode)
                    .map(Ok::<_, FilterContractViolation>)
                    .boxed()
            })
        };
        let chain = filter::compose(partition.handler_filters(), &request, &descriptor, invocation);
        let outcome = chain().await?;

        let outcome = match outcome {
            Err(fault) if !partition.exception_filters().is_empty() && !is_defect(&fault) => {
                filter::run_exception_filters(
                    partition.exception_filters(),
                    request.clone(),
                    descriptor.clone(),
                    fault,
                )
                .await
            }
            other => other,
        };

        outcome.map_err(|fault| into_mediator_error(fault, command))
    }
}

/// 处理器调用本身；声明了重试策略时由其包裹
async fn invoke(
    request: &Arc<Request>,
    descriptor: &Arc<HandlerDescriptor>,
    activated: &Activated,
    ctx: &CommandContext,
    mode: InvokeMode,
) -> Outcome {
    let call = descriptor.invoker(mode);
    let instance = activated.instance();
    match descriptor.retry() {
        Some(policy) => {
            policy
                .execute_async(|| call(instance, ctx, request.command()), request.cancellation())
                .await
        }
        None => call(instance, ctx, request.command()).await,
    }
}

/// 取消不经过异常过滤器
fn is_defect(fault: &anyhow::Error) -> bool {
    is_cancellation(fault)
}

/// 取消标记，或嵌套分发经 `?` 传回的 `MediatorError::Canceled`
fn is_cancellation(fault: &anyhow::Error) -> bool {
    fault.is::<Canceled>()
        || matches!(fault.downcast_ref::<MediatorError>(), Some(MediatorError::Canceled { .. }))
}

fn into_mediator_error(fault: anyhow::Error, command: &'static str) -> MediatorError {
    if is_cancellation(&fault) {
        return MediatorError::Canceled { command };
    }
    if let Some(MediatorError::TypeMismatch { expected, found }) = fault.downcast_ref::<MediatorError>() {
        return MediatorError::TypeMismatch {
            expected: *expected,
            found: *found,
        };
    }
    MediatorError::Handler(fault)
}
