use mediator_core::activator::Activation;
use mediator_core::catalog::HandlerCatalog;
use mediator_core::filter::{ExecutingContext, FilterRegistration, HandlerFilter};
use mediator_core::retry::{RetryPolicy, RetryStrategy, Transient, TransientMarkerDetection};
use mediator_core::{
    Command, CommandContext, CommandHandler, Handler, MediatorConfig, MediatorError,
    MessageProcessor, ServiceMap,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 处理器前若干次调用失败
#[derive(Default)]
struct Script {
    calls: AtomicUsize,
    failures: AtomicUsize,
}
impl Script {
    fn failing(times: usize) -> Arc<Self> {
        let script = Self::default();
        script.failures.store(times, Ordering::SeqCst);
        Arc::new(script)
    }
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
    fn next_fails(&self) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        call < self.failures.load(Ordering::SeqCst)
    }
}

#[derive(mediator_core::Validate)]
struct Charge;
impl Command for Charge {
    const NAME: &'static str = "Charge";
    type Result = &'static str;
}

static FLAKY_NOTIFIED: AtomicUsize = AtomicUsize::new(0);

/// 瞬时故障，固定间隔重试 3 次
struct FlakyGateway(Arc<Script>);
impl Handler for FlakyGateway {
    fn retry() -> Option<RetryPolicy> {
        let strategy = RetryStrategy::fixed(3, Duration::from_millis(1));
        Some(RetryPolicy::new(TransientMarkerDetection, strategy).on_retrying(|_| {
            FLAKY_NOTIFIED.fetch_add(1, Ordering::SeqCst);
        }))
    }
    fn create(activation: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        Ok(Some(Self(activation.require::<Script>()?)))
    }
}
#[async_trait::async_trait]
impl CommandHandler<Charge> for FlakyGateway {
    async fn handle(&self, _ctx: &CommandContext, _cmd: &Charge) -> anyhow::Result<&'static str> {
        if self.0.next_fails() {
            return Err(Transient::new("gateway timeout").into());
        }
        Ok("charged")
    }
}

/// 每次失败都带有不同信息，便于确认返回的是最后一次故障
struct ExhaustedGateway(Arc<Script>);
impl Handler for ExhaustedGateway {
    fn retry() -> Option<RetryPolicy> {
        Some(RetryPolicy::catch_all(RetryStrategy::fixed(2, Duration::from_millis(1))))
    }
    fn create(activation: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        Ok(Some(Self(activation.require::<Script>()?)))
    }
}
#[async_trait::async_trait]
impl CommandHandler<Charge> for ExhaustedGateway {
    async fn handle(&self, _ctx: &CommandContext, _cmd: &Charge) -> anyhow::Result<&'static str> {
        self.0.next_fails();
        anyhow::bail!("attempt {} failed", self.0.calls())
    }
}

/// 非瞬时故障不重试
struct RejectingGateway(Arc<Script>);
impl Handler for RejectingGateway {
    fn retry() -> Option<RetryPolicy> {
        Some(RetryPolicy::new(
            TransientMarkerDetection,
            RetryStrategy::fixed(5, Duration::from_millis(1)),
        ))
    }
    fn create(activation: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        Ok(Some(Self(activation.require::<Script>()?)))
    }
}
#[async_trait::async_trait]
impl CommandHandler<Charge> for RejectingGateway {
    async fn handle(&self, _ctx: &CommandContext, _cmd: &Charge) -> anyhow::Result<&'static str> {
        self.0.next_fails();
        anyhow::bail!("card declined")
    }
}

/// 失败前取消自身请求，等待期间观察到取消
struct CancellingGateway(Arc<Script>);
impl Handler for CancellingGateway {
    fn retry() -> Option<RetryPolicy> {
        let strategy = RetryStrategy::fixed(5, Duration::from_secs(30)).with_fast_first_retry(false);
        Some(RetryPolicy::catch_all(strategy))
    }
    fn create(activation: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        Ok(Some(Self(activation.require::<Script>()?)))
    }
}
#[async_trait::async_trait]
impl CommandHandler<Charge> for CancellingGateway {
    async fn handle(&self, ctx: &CommandContext, _cmd: &Charge) -> anyhow::Result<&'static str> {
        self.0.next_fails();
        ctx.cancellation().cancel();
        anyhow::bail!("connection reset")
    }
}

struct CountingFilter(Arc<AtomicUsize>);
#[async_trait::async_trait]
impl HandlerFilter for CountingFilter {
    async fn on_executing(&self, _ctx: &mut ExecutingContext) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn processor<H>(script: &Arc<Script>, filters: Vec<FilterRegistration>) -> MessageProcessor
where
    H: CommandHandler<Charge>,
{
    let services = ServiceMap::new();
    services.insert(script.clone());
    let mut catalog = HandlerCatalog::new();
    catalog.register::<Charge, H>().unwrap();
    MessageProcessor::new(
        MediatorConfig::builder()
            .catalog(catalog)
            .resolver(Arc::new(services))
            .global_filters(filters)
            .build(),
    )
}

#[tokio::test]
async fn transient_faults_are_retried_until_success() {
    let script = Script::failing(2);
    let filter_runs = Arc::new(AtomicUsize::new(0));
    let processor = processor::<FlakyGateway>(
        &script,
        vec![FilterRegistration::handler(CountingFilter(filter_runs.clone()))],
    );

    let value = processor.send(Charge).await.into_result().unwrap();
    assert_eq!(value, "charged");
    assert_eq!(script.calls(), 3);
    assert_eq!(FLAKY_NOTIFIED.load(Ordering::SeqCst), 2);
    // 重试只包裹处理器调用本身
    assert_eq!(filter_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_retries_return_the_last_fault() {
    let script = Script::failing(usize::MAX);
    let processor = processor::<ExhaustedGateway>(&script, Vec::new());

    let response = processor.send(Charge).await;
    assert_eq!(script.calls(), 3);
    assert_eq!(response.error().unwrap().to_string(), "attempt 3 failed");
}

#[tokio::test]
async fn non_transient_fault_is_not_retried() {
    let script = Script::failing(usize::MAX);
    let processor = processor::<RejectingGateway>(&script, Vec::new());

    let response = processor.send(Charge).await;
    assert_eq!(script.calls(), 1);
    assert!(matches!(response.error(), Some(MediatorError::Handler(_))));
}

#[tokio::test]
async fn cancellation_during_delay_stops_retrying() {
    let script = Script::failing(usize::MAX);
    let processor = processor::<CancellingGateway>(&script, Vec::new());

    let response = tokio::time::timeout(Duration::from_secs(5), processor.send(Charge))
        .await
        .expect("retry delay must observe cancellation");
    assert_eq!(script.calls(), 1);
    assert_eq!(response.error().unwrap().to_string(), "connection reset");
}
