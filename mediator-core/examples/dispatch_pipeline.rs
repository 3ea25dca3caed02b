use async_trait::async_trait;
use mediator_core::activator::Activation;
use mediator_core::catalog::HandlerCatalog;
use mediator_core::filter::{
    ExceptionContext, ExceptionFilter, ExecutedContext, ExecutingContext, FilterRegistration,
    HandlerFilter,
};
use mediator_core::retry::{RetryPolicy, RetryStrategy, Transient, TransientMarkerDetection};
use mediator_core::{
    Command, CommandBus, CommandContext, CommandHandler, Handler, Lifetime, MediatorConfig,
    MediatorError, MessageProcessor, Validate,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Validate)]
struct ReserveStock {
    #[validate(required, length(min = 3, max = 12))]
    sku: String,
    #[validate(range(min = 1, max = 100))]
    quantity: u32,
}

impl Command for ReserveStock {
    const NAME: &'static str = "ReserveStock";
    type Result = u32;
}

#[derive(Debug, Validate)]
struct PlaceOrder {
    #[validate(required)]
    customer: String,
    lines: Vec<ReserveStock>,
}

impl Command for PlaceOrder {
    const NAME: &'static str = "PlaceOrder";
    type Result = String;
}

/// 库存服务：前两次调用超时
#[derive(Default)]
struct Inventory {
    attempts: AtomicU32,
}

impl Handler for Inventory {
    fn lifetime() -> Lifetime {
        Lifetime::Singleton
    }

    fn retry() -> Option<RetryPolicy> {
        let strategy = RetryStrategy::exponential(
            4,
            Duration::from_millis(5),
            Duration::from_millis(100),
            Duration::from_millis(10),
        );
        Some(
            RetryPolicy::new(TransientMarkerDetection, strategy).on_retrying(|r| {
                println!("  retry #{} in {:?}: {}", r.attempt, r.delay, r.cause);
            }),
        )
    }

    fn create(_: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        Ok(Some(Inventory::default()))
    }

    fn dispose(&self) {
        println!("inventory disposed after {} attempts", self.attempts.load(Ordering::SeqCst));
    }
}

#[async_trait]
impl CommandHandler<ReserveStock> for Inventory {
    async fn handle(&self, _ctx: &CommandContext, cmd: &ReserveStock) -> anyhow::Result<u32> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < 2 {
            return Err(Transient::new("inventory timeout").into());
        }
        Ok(cmd.quantity)
    }
}

struct Orders;

impl Handler for Orders {
    fn create(_: &Activation<'_>) -> anyhow::Result<Option<Self>> {
        Ok(Some(Orders))
    }
}

#[async_trait]
impl CommandHandler<PlaceOrder> for Orders {
    async fn handle(&self, ctx: &CommandContext, cmd: &PlaceOrder) -> anyhow::Result<String> {
        let mut reserved = 0;
        for line in &cmd.lines {
            reserved += ctx
                .send(ReserveStock {
                    sku: line.sku.clone(),
                    quantity: line.quantity,
                })
                .await?;
        }
        if reserved == 0 {
            anyhow::bail!("nothing to reserve");
        }
        Ok(format!("{} reserved {reserved} item(s)", cmd.customer))
    }
}

/// 计时过滤器
struct Timing;

#[async_trait]
impl HandlerFilter for Timing {
    async fn on_executing(&self, ctx: &mut ExecutingContext) -> anyhow::Result<()> {
        ctx.request().properties().insert(
            mediator_core::property_bag::PropertyKey::of::<Instant>("timing.start"),
            std::sync::Arc::new(Instant::now()),
        );
        Ok(())
    }

    async fn on_executed(&self, ctx: &mut ExecutedContext) -> anyhow::Result<()> {
        let key = mediator_core::property_bag::PropertyKey::of::<Instant>("timing.start");
        if let Some(start) = ctx.request().properties().get::<Instant>(&key) {
            println!(
                "  {} finished in {:?} (faulted: {})",
                ctx.request().command_name(),
                start.elapsed(),
                ctx.is_faulted()
            );
        }
        Ok(())
    }
}

/// 把空订单转为友好的回复
struct EmptyOrderFallback;

#[async_trait]
impl ExceptionFilter for EmptyOrderFallback {
    async fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()> {
        if ctx.fault().to_string() == "nothing to reserve" {
            ctx.set_result("order is empty".to_string());
        }
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut catalog = HandlerCatalog::new();
    catalog.register::<ReserveStock, Inventory>()?;
    catalog.register::<PlaceOrder, Orders>()?;

    let processor = MessageProcessor::new(
        MediatorConfig::builder()
            .catalog(catalog)
            .global_filters(vec![
                FilterRegistration::handler(Timing),
                FilterRegistration::exception(EmptyOrderFallback),
            ])
            .build(),
    );

    println!("place order:");
    let reply = processor
        .dispatch(PlaceOrder {
            customer: "alice".into(),
            lines: vec![ReserveStock {
                sku: "SKU-001".into(),
                quantity: 2,
            }],
        })
        .await?;
    println!("  -> {reply}");

    println!("empty order:");
    let reply = processor
        .dispatch(PlaceOrder {
            customer: "bob".into(),
            lines: Vec::new(),
        })
        .await?;
    println!("  -> {reply}");

    println!("invalid order:");
    let response = processor
        .send(PlaceOrder {
            customer: " ".into(),
            lines: vec![ReserveStock {
                sku: "X".into(),
                quantity: 0,
            }],
        })
        .await;
    if let Some(MediatorError::InvalidCommand { model_state, .. }) = response.error() {
        for (key, errors) in model_state.iter() {
            for error in errors {
                println!("  {key}: {}", error.message());
            }
        }
    }

    processor.shutdown();
    Ok(())
}
