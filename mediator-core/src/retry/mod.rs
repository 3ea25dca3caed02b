//! 重试子系统
//!
//! - [`strategy`]：纯函数式的重试策略（固定/递增/指数退避）；
//! - [`detection`]：瞬时故障判定；
//! - [`policy`]：同步与异步重试循环。
//!
pub mod detection;
pub mod policy;
pub mod strategy;

pub use detection::{Transient, TransientErrorCatchAll, TransientErrorDetection, TransientMarkerDetection};
pub use policy::{RetryPolicy, Retrying};
pub use strategy::RetryStrategy;
