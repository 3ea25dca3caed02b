use mediator_core::activator::Activation;
use mediator_core::catalog::HandlerCatalog;
use mediator_core::filter::{
    ExceptionContext, ExceptionFilter, ExecutedContext, ExecutingContext, FilterRegistration,
    FilterScope, HandlerFilter,
};
use mediator_core::{
    Command, CommandContext, CommandHandler, Handler, MediatorConfig, MediatorError,
    MessageProcessor, ServiceMap,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);
impl Log {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct Calls(AtomicUsize);

#[derive(mediator_core::Validate)]
struct Greet {
    fail: bool,
}
impl Command for Greet {
    const NAME: &'static str = "Greet";
    type Result = String;
}

struct GreetHandler {
    calls: Arc<Calls>,
    log: Arc<Log>,
}
impl Handler for GreetHandler {
    fn create(activation: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        Ok(Some(Self {
            calls: activation.require::<Calls>()?,
            log: activation.require::<Log>()?,
        }))
    }
}
#[async_trait::async_trait]
impl CommandHandler<Greet> for GreetHandler {
    async fn handle(&self, _ctx: &CommandContext, cmd: &Greet) -> anyhow::Result<String> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        self.log.push("handler");
        if cmd.fail {
            return Err(Boom.into());
        }
        Ok("OK".to_string())
    }
}

/// 前置/后置记录日志，后置把标签追加到结果
struct Tag {
    name: &'static str,
    log: Log,
}
#[async_trait::async_trait]
impl HandlerFilter for Tag {
    async fn on_executing(&self, _ctx: &mut ExecutingContext) -> anyhow::Result<()> {
        self.log.push(format!("before {}", self.name));
        Ok(())
    }
    async fn on_executed(&self, ctx: &mut ExecutedContext) -> anyhow::Result<()> {
        self.log.push(format!("after {}", self.name));
        if let Some(value) = ctx.value_mut::<String>() {
            value.push_str(self.name);
        }
        Ok(())
    }
}

struct Cached;
#[async_trait::async_trait]
impl HandlerFilter for Cached {
    async fn on_executing(&self, ctx: &mut ExecutingContext) -> anyhow::Result<()> {
        ctx.set_result("cached".to_string());
        Ok(())
    }
}

struct Heal;
#[async_trait::async_trait]
impl HandlerFilter for Heal {
    async fn on_executed(&self, ctx: &mut ExecutedContext) -> anyhow::Result<()> {
        if ctx.fault().is_some_and(|f| f.is::<Boom>()) {
            ctx.set_value("healed".to_string());
        }
        Ok(())
    }
}

struct Swallow;
#[async_trait::async_trait]
impl HandlerFilter for Swallow {
    async fn on_executed(&self, ctx: &mut ExecutedContext) -> anyhow::Result<()> {
        let _ = ctx.take_outcome();
        Ok(())
    }
}

struct Gate;
#[async_trait::async_trait]
impl HandlerFilter for Gate {
    async fn on_executing(&self, _ctx: &mut ExecutingContext) -> anyhow::Result<()> {
        anyhow::bail!("gate closed")
    }
}

struct Recover {
    log: Log,
}
#[async_trait::async_trait]
impl ExceptionFilter for Recover {
    async fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()> {
        self.log.push("recover");
        if ctx.fault().downcast_ref::<Boom>().is_some() {
            ctx.set_result("recovered".to_string());
        }
        Ok(())
    }
}

struct Observe {
    log: Log,
}
#[async_trait::async_trait]
impl ExceptionFilter for Observe {
    async fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()> {
        self.log.push(format!("observe {}", ctx.fault()));
        Ok(())
    }
}

struct Fixture {
    processor: MessageProcessor,
    calls: Arc<Calls>,
    log: Log,
}

fn fixture(filters: impl FnOnce(&Log) -> Vec<FilterRegistration>) -> Fixture {
    let calls = Arc::new(Calls::default());
    let log = Log::default();
    let services = ServiceMap::new();
    services.insert(calls.clone());
    services.insert(Arc::new(log.clone()));

    let mut catalog = HandlerCatalog::new();
    catalog.register::<Greet, GreetHandler>().unwrap();
    let config = MediatorConfig::builder()
        .catalog(catalog)
        .resolver(Arc::new(services))
        .global_filters(filters(&log))
        .build();
    Fixture {
        processor: MessageProcessor::new(config),
        calls,
        log,
    }
}

fn tag(name: &'static str, log: &Log) -> FilterRegistration {
    FilterRegistration::handler(Tag {
        name,
        log: log.clone(),
    })
}

#[tokio::test]
async fn before_hooks_run_in_order_and_after_hooks_in_reverse() {
    let fx = fixture(|log| vec![tag("X", log), tag("Y", log)]);

    let value = fx.processor.send(Greet { fail: false }).await.into_result().unwrap();
    assert_eq!(value, "OKYX");
    assert_eq!(
        fx.log.entries(),
        vec!["before X", "before Y", "handler", "after Y", "after X"]
    );
}

#[tokio::test]
async fn order_values_decide_nesting() {
    let fx = fixture(|log| vec![tag("X", log).with_order(2), tag("Y", log).with_order(1)]);

    let value = fx.processor.send(Greet { fail: false }).await.into_result().unwrap();
    assert_eq!(value, "OKXY");
}

#[tokio::test]
async fn before_hook_result_short_circuits() {
    let fx = fixture(|log| {
        vec![
            tag("X", log),
            FilterRegistration::handler(Cached),
            tag("Y", log),
        ]
    });

    let value = fx.processor.send(Greet { fail: false }).await.into_result().unwrap();
    assert_eq!(value, "cachedX");
    assert_eq!(fx.calls.0.load(Ordering::SeqCst), 0);
    assert_eq!(fx.log.entries(), vec!["before X", "after X"]);
}

#[tokio::test]
async fn after_hook_can_recover_a_fault() {
    let fx = fixture(|log| vec![tag("X", log), FilterRegistration::handler(Heal)]);

    let value = fx.processor.send(Greet { fail: true }).await.into_result().unwrap();
    assert_eq!(value, "healedX");
}

#[tokio::test]
async fn exception_filters_run_in_reverse_until_handled() {
    let fx = fixture(|log| {
        vec![
            FilterRegistration::exception(Observe { log: log.clone() }),
            FilterRegistration::exception(Recover { log: log.clone() }),
        ]
    });

    let value = fx.processor.send(Greet { fail: true }).await.into_result().unwrap();
    assert_eq!(value, "recovered");
    assert_eq!(fx.log.entries(), vec!["handler", "recover"]);
}

#[tokio::test]
async fn unhandled_fault_keeps_its_original_type() {
    let fx = fixture(|log| vec![FilterRegistration::exception(Observe { log: log.clone() })]);

    let response = fx.processor.send(Greet { fail: true }).await;
    let fault = response.error().and_then(MediatorError::handler_fault).unwrap();
    assert!(fault.downcast_ref::<Boom>().is_some());
    assert_eq!(fx.log.entries(), vec!["handler", "observe boom"]);
}

#[tokio::test]
async fn before_hook_error_becomes_the_chain_fault() {
    let fx = fixture(|log| {
        vec![
            FilterRegistration::handler(Gate),
            FilterRegistration::exception(Observe { log: log.clone() }),
        ]
    });

    let response = fx.processor.send(Greet { fail: false }).await;
    assert!(matches!(response.error(), Some(MediatorError::Handler(_))));
    assert_eq!(fx.calls.0.load(Ordering::SeqCst), 0);
    assert_eq!(fx.log.entries(), vec!["observe gate closed"]);
}

#[tokio::test]
async fn empty_outcome_is_a_contract_violation() {
    let fx = fixture(|log| {
        vec![
            tag("X", log),
            FilterRegistration::handler(Swallow),
            FilterRegistration::exception(Recover { log: log.clone() }),
        ]
    });

    let response = fx.processor.send(Greet { fail: true }).await;
    assert!(matches!(response.error(), Some(MediatorError::FilterContract(_))));
    // 外层后置钩子与异常过滤器都被绕过
    assert_eq!(fx.log.entries(), vec!["before X", "handler"]);
}

#[tokio::test]
async fn replaced_filter_list_rebuilds_partition() {
    let fx = fixture(|log| vec![tag("X", log)]);
    assert_eq!(
        fx.processor.send(Greet { fail: false }).await.into_result().unwrap(),
        "OKX"
    );

    let descriptor = fx.processor.config().select_handler_for::<Greet>().unwrap();
    assert_eq!(descriptor.filters()[0].scope(), FilterScope::Global);
    descriptor.replace_filters(vec![tag("Z", &fx.log)]);

    assert_eq!(
        fx.processor.send(Greet { fail: false }).await.into_result().unwrap(),
        "OKZ"
    );
}
