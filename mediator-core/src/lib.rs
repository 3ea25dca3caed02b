//! 进程内命令中介者
//!
//! 把类型化命令路由到唯一的处理器，并以可配置的管道包裹调用：
//! 校验、处理器过滤器、异常恢复与重试；同时保证处理器生命周期与资源释放约定。
//!
// 让 `#[derive(Validate)]` 生成的 `::mediator_core::...` 路径在本 crate 内同样可用
extern crate self as mediator_core;

pub mod activator;
pub mod catalog;
pub mod command;
pub mod command_bus;
pub mod command_handler;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod handler;
pub mod model_state;
pub mod processor;
pub mod property_bag;
pub mod request;
pub mod resolver;
pub mod response;
pub mod retry;
pub mod type_cache;
pub mod validation;
pub mod worker;

pub use activator::{Activated, Activation, HandlerActivator};
pub use catalog::{HandlerCatalog, HandlerType, HandlerTypeProvider};
pub use command::Command;
pub use command_bus::CommandBus;
pub use command_handler::CommandHandler;
pub use config::MediatorConfig;
pub use context::CommandContext;
pub use descriptor::HandlerDescriptor;
pub use error::{MediatorError, MediatorResult};
pub use filter::{ExceptionFilter, FilterRegistration, HandlerFilter};
pub use handler::{Handler, Lifetime};
pub use model_state::{ModelError, ModelState};
pub use processor::{MessageProcessor, SendOptions};
pub use request::Request;
pub use resolver::{DependencyResolver, DependencyScope, NullDependencyResolver, ServiceMap};
pub use response::Response;
pub use retry::{RetryPolicy, RetryStrategy};
pub use validation::{ValidationEngine, Validate};

/// `#[derive(Validate)]`
pub use mediator_macros::Validate;
