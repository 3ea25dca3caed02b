//! 处理器声明（Handler）
//!
//! 处理器类型在此声明生命周期、重试策略与处理器级过滤器；
//! 这些声明只在构建描述符时读取一次，之后的变化不影响已构建的描述符。
//!
use crate::activator::Activation;
use crate::filter::FilterRegistration;
use crate::retry::RetryPolicy;

/// 处理器实例的共享范围
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// 每次调用新建
    #[default]
    Transient,
    /// 每个根请求一个，嵌套请求共享
    PerRequest,
    /// 激活器存续期间每个处理器类型一个
    Singleton,
}

pub trait Handler: Sized + Send + Sync + 'static {
    fn lifetime() -> Lifetime {
        Lifetime::Transient
    }

    /// 处理器级重试策略，仅包裹处理器本身的调用
    fn retry() -> Option<RetryPolicy> {
        None
    }

    /// 处理器级过滤器，与全局过滤器合并
    fn filters() -> Vec<FilterRegistration> {
        Vec::new()
    }

    /// 构造处理器
    ///
    /// 返回 `Ok(None)` 表示无法构造（且依赖解析器也未提供时，视为无处理器）。
    fn create(activation: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        let _ = activation;
        Ok(None)
    }

    /// 释放资源；由中介者在其生命周期结束时调用一次
    fn dispose(&self) {}
}
