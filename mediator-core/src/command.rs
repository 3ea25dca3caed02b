use crate::validation::Validate;

/// 命令（Command）
///
/// 调用方提交的一次工作单元，其运行期类型即分发键。
/// - 每个命令类型恰好对应一个处理器；
/// - 无返回值的命令将 `Result` 设为 `()`；
/// - 命令图通过 [`Validate`] 暴露给校验引擎（通常由 `#[derive(Validate)]` 生成）。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于日志、追踪与错误信息。避免依赖 `type_name::<T>()`。
pub trait Command: Validate + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;

    /// 处理结果类型
    type Result: Send + 'static;
}
