//! 消息处理器（MessageProcessor）
//!
//! 对外入口：构建请求、在 tracing span 中执行、捕获并记录故障、
//! 在所有路径上结束请求（逆序执行释放列表），最后生成响应。
//!
use crate::command::Command;
use crate::config::MediatorConfig;
use crate::error::MediatorError;
use crate::request::Request;
use crate::response::Response;
use crate::worker::{CommandWorker, InvokeMode};
use std::any::type_name;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

/// 分发选项
#[derive(Debug, Default, bon::Builder)]
pub struct SendOptions {
    /// 父请求：设置后新请求成为其子请求
    parent: Option<Arc<Request>>,
    /// 取消令牌：未设置时根请求新建，子请求派生父请求的子令牌
    cancellation: Option<CancellationToken>,
}

#[derive(Clone)]
pub struct MessageProcessor {
    config: Arc<MediatorConfig>,
    worker: CommandWorker,
}

impl MessageProcessor {
    pub fn new(config: MediatorConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<MediatorConfig>) -> Self {
        Self {
            config,
            worker: CommandWorker,
        }
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    /// 分发命令并取得结果
    pub async fn send<C: Command>(&self, cmd: C) -> Response<C::Result> {
        self.send_with(cmd, SendOptions::default()).await
    }

    pub async fn send_with<C: Command>(&self, cmd: C, options: SendOptions) -> Response<C::Result> {
        self.run::<C, C::Result>(cmd, options, InvokeMode::Value).await
    }

    /// 分发命令，只关心是否成功
    pub async fn post<C: Command>(&self, cmd: C) -> Response<()> {
        self.post_with(cmd, SendOptions::default()).await
    }

    pub async fn post_with<C: Command>(&self, cmd: C, options: SendOptions) -> Response<()> {
        self.run::<C, ()>(cmd, options, InvokeMode::Void).await
    }

    /// 释放全部单例处理器，返回释放数量
    pub fn shutdown(&self) -> usize {
        let disposed = self.config.disposables().drain();
        info!(disposed, "message processor shut down");
        disposed
    }

    async fn run<C, T>(&self, cmd: C, options: SendOptions, mode: InvokeMode) -> Response<T>
    where
        C: Command,
        T: Send + 'static,
    {
        let request = match &options.parent {
            Some(parent) => Request::child(cmd, parent),
            None => Request::new(cmd),
        };
        let request = match options.cancellation {
            Some(token) => request.with_cancellation(token),
            None => request,
        };
        let request = Arc::new(request);

        let span = info_span!(
            "dispatch",
            command = C::NAME,
            request_id = %request.id(),
            parent_id = ?request.parent_id(),
            ?mode,
        );

        let result = self
            .worker
            .execute(self, request.clone(), mode)
            .instrument(span.clone())
            .await
            .and_then(|value| {
                value
                    .downcast::<T>()
                    .map(|value| *value)
                    .map_err(|_| MediatorError::TypeMismatch {
                        expected: type_name::<T>(),
                        found: "handler result",
                    })
            });

        span.in_scope(|| match &result {
            Ok(_) => debug!("dispatch completed"),
            Err(MediatorError::InvalidCommand { model_state, .. }) => {
                info!(errors = model_state.error_count(), "command is invalid")
            }
            Err(MediatorError::Canceled { .. }) => info!("dispatch canceled"),
            Err(err) => error!(error = %err, "dispatch failed"),
        });

        let model_state = request.model_state();
        request.end();
        Response::new(request.id(), request.parent_id(), C::NAME, result, model_state)
    }
}

impl std::fmt::Debug for MessageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageProcessor")
            .field("config", &self.config.id())
            .finish()
    }
}
