use std::sync::Arc;

use shapebus_events::{BusConfig, Event, EventBus, EventHeader, Priority, ShapeSet, upcast};

trait Auditable: Send + Sync {
    fn audit_line(&self) -> String;
}

struct OrderPlaced {
    header: EventHeader,
    order_id: u64,
    total_cents: i64,
}

impl OrderPlaced {
    fn new(order_id: u64, total_cents: i64) -> Self {
        Self {
            header: EventHeader::new(),
            order_id,
            total_cents,
        }
    }
}

impl Auditable for OrderPlaced {
    fn audit_line(&self) -> String {
        format!("order {} placed ({} cents)", self.order_id, self.total_cents)
    }
}

upcast!(OrderPlaced => dyn Auditable);

impl Event for OrderPlaced {
    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn declare_shapes(shapes: &mut ShapeSet<Self>) {
        shapes.implements::<dyn Auditable>();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shapebus_observability::init();

    let config = BusConfig::from_env()?;
    let bus = EventBus::builder().config(config).build()?;

    bus.subscribe_fn::<OrderPlaced, _>(
        |order| {
            tracing::info!(order_id = order.order_id, "reserving stock");
            Ok(())
        },
        Priority::HIGH,
    );
    let audit = bus.subscribe_fn::<dyn Auditable, _>(
        |event| {
            tracing::info!(line = %event.audit_line(), "audit");
            Ok(())
        },
        Priority::NORMAL,
    );
    bus.subscribe_nullary::<OrderPlaced, _>(
        || anyhow::bail!("notification service unreachable"),
        Priority::LOW,
    );

    let first = OrderPlaced::new(1001, 4_250);
    let delivered = bus.publish(&first)?;
    tracing::info!(delivered, disposed = first.is_disposed(), "sync publish done");

    let second = Arc::new(OrderPlaced::new(1002, 990));
    let report = bus.publish_async(second.clone())?.await;
    tracing::info!(
        submitted = report.submitted,
        invoked = report.invoked,
        failed = report.failed,
        disposed = second.is_disposed(),
        "fan-out publish done"
    );

    if let Err(err) = bus.publish(&first) {
        tracing::warn!(error = %err, "republishing a disposed event is rejected");
    }

    bus.unsubscribe(&audit);
    tracing::info!(subscriptions = bus.subscription_count(), "audit handler removed");
    Ok(())
}
