//! Integration tests for the reconciliation service.
//!
//! These tests drive the full lifecycle through the service against the
//! in-memory store, including the concurrency guarantees around payment
//! capture and the conflict retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BusinessId, ItemId, LocationId, OrderId, UserId, Version};
use domain::{HistoryEntry, Money, Order, OrderError, OrderStatus, PaymentStatus, Quantity};
use order_store::{
    HistoryQuery, HistoryStream, InMemoryOrderStore, OrderStore, StoreError,
};
use reconciliation::{
    CreateOrderRequest, InMemoryCatalog, InMemoryIdentity, InMemoryLocations, LineRequest,
    OrderNumberPolicy, ReconcileError, ReconciliationService, Role,
};

type Service<S = InMemoryOrderStore> =
    ReconciliationService<S, InMemoryCatalog, InMemoryIdentity, InMemoryLocations>;

struct World {
    business_id: BusinessId,
    location_id: LocationId,
    admin: UserId,
    widget: ItemId,
    gadget: ItemId,
}

fn setup() -> (Service, World) {
    setup_with_store(InMemoryOrderStore::new())
}

fn setup_with_store<S: OrderStore>(store: S) -> (Service<S>, World) {
    let catalog = InMemoryCatalog::new();
    let identity = InMemoryIdentity::new();
    let locations = InMemoryLocations::new();

    let business_id = BusinessId::new();
    let location_id = locations.add_location(business_id);
    let admin = identity.add_user(business_id, Role::Owner);
    let widget = catalog.add_item("Widget", Money::from_cents(1000), 100);
    let gadget = catalog.add_item("Gadget", Money::from_cents(500), 100);

    (
        ReconciliationService::new(store, catalog, identity, locations),
        World {
            business_id,
            location_id,
            admin,
            widget,
            gadget,
        },
    )
}

fn worked_example_request(world: &World) -> CreateOrderRequest {
    CreateOrderRequest::new(vec![
        LineRequest::new(world.widget, 2),
        LineRequest::new(world.gadget, 1),
    ])
    .with_tax(Money::from_cents(150))
}

async fn assert_invariants<S: OrderStore>(service: &Service<S>, world: &World, order: &Order) {
    // total == subtotal + tax - discount, remaining == total - paid
    assert_eq!(
        order.total_amount(),
        order.subtotal() + order.tax_amount() - order.discount_amount()
    );
    assert_eq!(
        order.remaining_amount(),
        order.total_amount() - order.paid_amount()
    );
    assert!(order.paid_amount() <= order.total_amount());

    // the latest history entry is authoritative for the current status
    let trail = service
        .get_history(world.admin, order.id())
        .await
        .unwrap();
    assert_eq!(trail.last().unwrap().new_status, order.status());
}

#[tokio::test]
async fn full_lifecycle_with_partial_refund() {
    let (service, world) = setup();

    // Create: 2 x 10.00 + 1 x 5.00, tax 1.50 -> total 26.50
    let order = service
        .create_order(world.admin, world.location_id, worked_example_request(&world))
        .await
        .unwrap();
    assert_eq!(order.subtotal().cents(), 2500);
    assert_eq!(order.total_amount().cents(), 2650);
    assert_eq!(order.remaining_amount().cents(), 2650);
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_invariants(&service, &world, &order).await;

    // Pay in full
    let order = service
        .capture_payment(world.admin, order.id(), Money::from_cents(2650), "card")
        .await
        .unwrap();
    assert_eq!(order.payment_status(), PaymentStatus::Paid);
    assert_eq!(order.remaining_amount(), Money::zero());
    assert_invariants(&service, &world, &order).await;

    // Walk to fulfilled
    service
        .change_status(world.admin, order.id(), OrderStatus::Confirmed, None)
        .await
        .unwrap();
    let order = service
        .change_status(world.admin, order.id(), OrderStatus::Fulfilled, None)
        .await
        .unwrap();
    assert_invariants(&service, &world, &order).await;

    // Refund one unit of the 10.00 line
    let line_a = order
        .lines()
        .iter()
        .find(|l| l.unit_price().cents() == 1000)
        .unwrap()
        .id();
    let order = service
        .refund_line(world.admin, order.id(), line_a, Quantity::new(1), "damaged")
        .await
        .unwrap();

    assert_eq!(order.line(line_a).unwrap().refunded_amount().cents(), 1000);
    assert_eq!(order.payment_status(), PaymentStatus::PartiallyRefunded);
    assert_eq!(order.status(), OrderStatus::PartiallyReturned);
    assert_invariants(&service, &world, &order).await;

    // Full audit trail: created, payment, 2 status changes, refund
    let trail = service.get_history(world.admin, order.id()).await.unwrap();
    let tags: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        tags,
        vec![
            "created",
            "payment_captured",
            "status_changed",
            "status_changed",
            "refunded"
        ]
    );
}

#[tokio::test]
async fn return_bounds_are_enforced() {
    let (service, world) = setup();
    let order = service
        .create_order(
            world.admin,
            world.location_id,
            CreateOrderRequest::new(vec![LineRequest::new(world.widget, 5)]),
        )
        .await
        .unwrap();
    service
        .capture_payment(world.admin, order.id(), order.total_amount(), "card")
        .await
        .unwrap();
    service
        .change_status(world.admin, order.id(), OrderStatus::Confirmed, None)
        .await
        .unwrap();
    service
        .change_status(world.admin, order.id(), OrderStatus::Fulfilled, None)
        .await
        .unwrap();

    let line_id = order.lines()[0].id();
    service
        .refund_line(world.admin, order.id(), line_id, Quantity::new(2), "scratch")
        .await
        .unwrap();

    // quantity=5, returned=2: q=4 must fail, q=3 must succeed and close out
    let result = service
        .refund_line(world.admin, order.id(), line_id, Quantity::new(4), "more")
        .await;
    assert!(matches!(
        result,
        Err(ReconcileError::Order(OrderError::InvalidReturn { .. }))
    ));

    let order = service
        .refund_line(world.admin, order.id(), line_id, Quantity::new(3), "more")
        .await
        .unwrap();
    assert_eq!(order.line(line_id).unwrap().returned_quantity(), Quantity::new(5));
    assert_eq!(order.status(), OrderStatus::Returned);
    assert_eq!(order.payment_status(), PaymentStatus::Refunded);
}

#[tokio::test]
async fn concurrent_captures_never_exceed_total() {
    // Two concurrent 15.00 captures against a 20.00 order: exactly one
    // wins, and the final paid amount never reflects both.
    let (service, world) = setup();
    let order = service
        .create_order(
            world.admin,
            world.location_id,
            CreateOrderRequest::new(vec![LineRequest::new(world.widget, 2)]),
        )
        .await
        .unwrap();
    assert_eq!(order.total_amount().cents(), 2000);

    let service = Arc::new(service);
    let a = {
        let service = service.clone();
        let order_id = order.id();
        let user = world.admin;
        tokio::spawn(async move {
            service
                .capture_payment(user, order_id, Money::from_cents(1500), "card")
                .await
        })
    };
    let b = {
        let service = service.clone();
        let order_id = order.id();
        let user = world.admin;
        tokio::spawn(async move {
            service
                .capture_payment(user, order_id, Money::from_cents(1500), "cash")
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok_count, 1, "exactly one capture must win");

    for result in &results {
        if let Err(e) = result {
            assert!(
                matches!(
                    e,
                    ReconcileError::Order(OrderError::InvalidPayment { .. })
                        | ReconcileError::ConflictingUpdate(_)
                ),
                "loser must see InvalidPayment or ConflictingUpdate, got {e}"
            );
        }
    }

    let order = service.get_order(world.admin, order.id()).await.unwrap();
    assert_eq!(order.paid_amount().cents(), 1500);
    assert_eq!(order.payment_status(), PaymentStatus::Partial);
}

/// Store wrapper that fails the first `update` with a version conflict,
/// then delegates. Exercises the service's retry-once path
/// deterministically.
#[derive(Clone)]
struct ConflictOnce {
    inner: InMemoryOrderStore,
    fired: Arc<AtomicBool>,
}

impl ConflictOnce {
    fn new() -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl OrderStore for ConflictOnce {
    async fn insert(&self, order: &Order, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.inner.insert(order, entry).await
    }

    async fn update(&self, order: &Order, entry: &HistoryEntry) -> Result<Version, StoreError> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            return Err(StoreError::VersionConflict {
                order_id: order.id(),
                expected: order.version(),
                actual: order.version().next(),
            });
        }
        self.inner.update(order, entry).await
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.get(order_id).await
    }

    async fn list_by_location(&self, location_id: LocationId) -> Result<Vec<Order>, StoreError> {
        self.inner.list_by_location(location_id).await
    }

    async fn history(&self, order_id: OrderId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.inner.history(order_id).await
    }

    async fn query_history(&self, query: HistoryQuery) -> Result<Vec<HistoryEntry>, StoreError> {
        self.inner.query_history(query).await
    }

    async fn stream_history(&self) -> Result<HistoryStream, StoreError> {
        self.inner.stream_history().await
    }

    async fn current_version(&self, order_id: OrderId) -> Result<Option<Version>, StoreError> {
        self.inner.current_version(order_id).await
    }

    async fn sequence_for_day(
        &self,
        business_id: BusinessId,
        day: NaiveDate,
    ) -> Result<u32, StoreError> {
        self.inner.sequence_for_day(business_id, day).await
    }
}

#[tokio::test]
async fn conflicted_capture_retries_and_succeeds() {
    let (service, world) = setup_with_store(ConflictOnce::new());

    let order = service
        .create_order(
            world.admin,
            world.location_id,
            CreateOrderRequest::new(vec![LineRequest::new(world.widget, 2)]),
        )
        .await
        .unwrap();

    // First update attempt conflicts; the retry reloads and lands.
    let order = service
        .capture_payment(world.admin, order.id(), Money::from_cents(500), "card")
        .await
        .unwrap();
    assert_eq!(order.paid_amount().cents(), 500);
    assert_eq!(order.payment_status(), PaymentStatus::Partial);
}

/// Plants an order that occupies a candidate number for `day` without
/// counting toward that day's sequence (its order_date is a day earlier),
/// the same shape a racing creator leaves behind.
async fn occupy_candidate<S: OrderStore>(
    service: &Service<S>,
    world: &World,
    day: chrono::NaiveDate,
    sequence: u32,
) {
    let number = OrderNumberPolicy::default().candidate(world.business_id, day, sequence);
    let decoy = Order::create(domain::NewOrder {
        id: OrderId::new(),
        order_number: number,
        location_id: world.location_id,
        business_id: world.business_id,
        customer: domain::CustomerInfo::default(),
        order_date: day.and_time(chrono::NaiveTime::MIN).and_utc() - chrono::Duration::days(1),
        lines: vec![
            domain::LineItem::new(
                world.widget,
                "Widget",
                Quantity::new(1),
                Money::from_cents(1000),
                None,
            )
            .unwrap(),
        ],
        tax_amount: Money::zero(),
        discount_amount: Money::zero(),
        payment_method: None,
        notes: None,
        tags: Default::default(),
    })
    .unwrap();
    let entry = HistoryEntry::new(
        decoy.id(),
        world.admin,
        domain::actions::CREATED,
        None,
        decoy.status(),
        None,
    );
    service.store().insert(&decoy, &entry).await.unwrap();
}

#[tokio::test]
async fn order_number_collision_retries_next_candidate() {
    let (service, world) = setup();
    let today = chrono::Utc::now().date_naive();

    // The first candidate for today is already taken by an order that
    // does not count toward today's sequence.
    occupy_candidate(&service, &world, today, 1).await;

    let order = service
        .create_order(world.admin, world.location_id, worked_example_request(&world))
        .await
        .unwrap();
    assert!(order.order_number().ends_with("-0002"));
}

#[tokio::test]
async fn order_number_generation_exhausts_after_bounded_retries() {
    let (service, world) = setup();
    let service = service.with_number_policy(OrderNumberPolicy {
        prefix_len: 6,
        max_attempts: 3,
    });
    let today = chrono::Utc::now().date_naive();

    // Occupy every candidate the bounded retry will try
    for sequence in 1..=3 {
        occupy_candidate(&service, &world, today, sequence).await;
    }

    let result = service
        .create_order(world.admin, world.location_id, worked_example_request(&world))
        .await;
    assert!(matches!(
        result,
        Err(ReconcileError::OrderNumberExhausted { attempts: 3 })
    ));
}

#[tokio::test]
async fn list_orders_by_location_is_scoped() {
    let (service, world) = setup();
    service
        .create_order(world.admin, world.location_id, worked_example_request(&world))
        .await
        .unwrap();
    service
        .create_order(world.admin, world.location_id, worked_example_request(&world))
        .await
        .unwrap();

    let listed = service
        .list_orders_by_location(world.admin, world.location_id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);

    let result = service
        .list_orders_by_location(world.admin, LocationId::new())
        .await;
    assert!(matches!(result, Err(ReconcileError::LocationNotFound(_))));
}

#[tokio::test]
async fn cancellation_is_a_status_transition_not_a_delete() {
    let (service, world) = setup();
    let order = service
        .create_order(world.admin, world.location_id, worked_example_request(&world))
        .await
        .unwrap();

    let order = service
        .change_status(world.admin, order.id(), OrderStatus::Cancelled, Some("walkout".into()))
        .await
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);

    // Still present and listable; history records the cancellation
    let loaded = service.get_order(world.admin, order.id()).await.unwrap();
    assert_eq!(loaded.status(), OrderStatus::Cancelled);
    let trail = service.get_history(world.admin, order.id()).await.unwrap();
    assert_eq!(trail.last().unwrap().notes.as_deref(), Some("walkout"));
}
