//! The reconciliation service: sole orchestrator of order mutations.
//!
//! Every operation resolves the acting user, enforces business scoping,
//! applies the aggregate mutation, and persists order + line items + one
//! history entry as a single atomic write. Concurrent writers are handled
//! with the store's optimistic version check; a conflicted operation is
//! retried once against fresh state before surfacing `ConflictingUpdate`.

use chrono::Utc;
use common::{LineItemId, OrderId, UserId};
use domain::{
    HistoryEntry, LineItem, Money, NewOrder, Order, OrderError, OrderStatus, Quantity, actions,
};
use order_store::{OrderStore, StoreError};

use crate::error::{ReconcileError, Result};
use crate::lookups::{Actor, CatalogLookup, IdentityLookup, LocationLookup};
use crate::number::OrderNumberPolicy;
use crate::requests::CreateOrderRequest;

/// Service for managing orders across their lifecycle.
pub struct ReconciliationService<S, C, I, L>
where
    S: OrderStore,
    C: CatalogLookup,
    I: IdentityLookup,
    L: LocationLookup,
{
    store: S,
    catalog: C,
    identity: I,
    locations: L,
    number_policy: OrderNumberPolicy,
}

impl<S, C, I, L> ReconciliationService<S, C, I, L>
where
    S: OrderStore,
    C: CatalogLookup,
    I: IdentityLookup,
    L: LocationLookup,
{
    /// Creates a new service over the given store and lookups.
    pub fn new(store: S, catalog: C, identity: I, locations: L) -> Self {
        Self {
            store,
            catalog,
            identity,
            locations,
            number_policy: OrderNumberPolicy::default(),
        }
    }

    /// Overrides the order-number policy.
    pub fn with_number_policy(mut self, policy: OrderNumberPolicy) -> Self {
        self.number_policy = policy;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order from a cart of line items.
    ///
    /// Resolves the actor and location (the location must be active and
    /// belong to the actor's business), snapshots catalog names and
    /// prices, derives the totals, and persists order + items + the
    /// initial history entry atomically. Order-number collisions advance
    /// the per-day sequence and retry up to the policy bound.
    #[tracing::instrument(skip(self, request), fields(%user_id, %location_id))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        location_id: common::LocationId,
        request: CreateOrderRequest,
    ) -> Result<Order> {
        let actor = self.mutating_actor(user_id).await?;

        let location = self.locations.get_location(location_id).await?;
        if location.business_id != actor.business_id {
            return Err(ReconcileError::Forbidden {
                reason: "location belongs to another business".to_string(),
            });
        }
        if !location.is_active {
            return Err(ReconcileError::Forbidden {
                reason: "location is inactive".to_string(),
            });
        }

        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let item = self.catalog.get_item(line.item_id).await?;
            if !item.is_active {
                return Err(OrderError::InvalidLineItem {
                    reason: format!("item {} is inactive", line.item_id),
                }
                .into());
            }
            let unit_price = line.unit_price.unwrap_or(item.unit_price);
            lines.push(LineItem::new(
                line.item_id,
                item.name,
                Quantity::new(line.quantity),
                unit_price,
                line.discount,
            )?);
        }

        let order_date = request.order_date.unwrap_or_else(Utc::now);
        let day = order_date.date_naive();
        let order_id = OrderId::new();
        let base_sequence = self
            .store
            .sequence_for_day(actor.business_id, day)
            .await?;

        for attempt in 0..self.number_policy.max_attempts {
            let order_number =
                self.number_policy
                    .candidate(actor.business_id, day, base_sequence + 1 + attempt);

            let order = Order::create(NewOrder {
                id: order_id,
                order_number,
                location_id,
                business_id: actor.business_id,
                customer: request.customer.clone(),
                order_date,
                lines: lines.clone(),
                tax_amount: request.tax_amount,
                discount_amount: request.discount_amount,
                payment_method: request.payment_method.clone(),
                notes: request.notes.clone(),
                tags: request.tags.clone(),
            })?;

            let entry = HistoryEntry::new(
                order.id(),
                user_id,
                actions::CREATED,
                None,
                order.status(),
                None,
            );

            match self.store.insert(&order, &entry).await {
                Ok(()) => {
                    metrics::counter!("orders_created_total").increment(1);
                    tracing::info!(order_id = %order.id(), order_number = order.order_number(), "order created");
                    return Ok(order);
                }
                Err(StoreError::DuplicateOrderNumber(number)) => {
                    tracing::warn!(%number, "order number collision, trying next candidate");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ReconcileError::OrderNumberExhausted {
            attempts: self.number_policy.max_attempts,
        })
    }

    /// Captures a payment against an order.
    #[tracing::instrument(skip(self), fields(%user_id, %order_id, %amount))]
    pub async fn capture_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        amount: Money,
        method: &str,
    ) -> Result<Order> {
        let method = method.to_string();
        let notes = format!("captured {amount} via {method}");
        let order = self
            .mutate(
                user_id,
                order_id,
                actions::PAYMENT_CAPTURED,
                Some(notes),
                move |order| order.capture_payment(amount, &method),
            )
            .await?;
        metrics::counter!("payments_captured_total").increment(1);
        Ok(order)
    }

    /// Moves an order along its status machine.
    #[tracing::instrument(skip(self, notes), fields(%user_id, %order_id, %new_status))]
    pub async fn change_status(
        &self,
        user_id: UserId,
        order_id: OrderId,
        new_status: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order> {
        let order = self
            .mutate(
                user_id,
                order_id,
                actions::STATUS_CHANGED,
                notes,
                move |order| order.change_status(new_status),
            )
            .await?;
        metrics::counter!("status_changes_total").increment(1);
        Ok(order)
    }

    /// Records a return on one line of an order and reconciles the
    /// order's refund state.
    #[tracing::instrument(skip(self, reason), fields(%user_id, %order_id, %line_id))]
    pub async fn refund_line(
        &self,
        user_id: UserId,
        order_id: OrderId,
        line_id: LineItemId,
        quantity: Quantity,
        reason: &str,
    ) -> Result<Order> {
        let reason = reason.to_string();
        let order = self
            .mutate(
                user_id,
                order_id,
                actions::REFUNDED,
                Some(reason.clone()),
                move |order| order.refund_line(line_id, quantity, &reason).map(|_| ()),
            )
            .await?;
        metrics::counter!("refunds_recorded_total").increment(1);
        Ok(order)
    }

    /// Loads an order, enforcing business scoping.
    #[tracing::instrument(skip(self), fields(%user_id, %order_id))]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let actor = self.identity.get_actor(user_id).await?;
        self.load_scoped(&actor, order_id).await
    }

    /// Loads the audit trail of an order, enforcing business scoping.
    #[tracing::instrument(skip(self), fields(%user_id, %order_id))]
    pub async fn get_history(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Vec<HistoryEntry>> {
        let actor = self.identity.get_actor(user_id).await?;
        self.load_scoped(&actor, order_id).await?;
        Ok(self.store.history(order_id).await?)
    }

    /// Lists a location's orders, newest first, enforcing business
    /// scoping.
    #[tracing::instrument(skip(self), fields(%user_id, %location_id))]
    pub async fn list_orders_by_location(
        &self,
        user_id: UserId,
        location_id: common::LocationId,
    ) -> Result<Vec<Order>> {
        let actor = self.identity.get_actor(user_id).await?;
        let location = self.locations.get_location(location_id).await?;
        if location.business_id != actor.business_id {
            return Err(ReconcileError::Forbidden {
                reason: "location belongs to another business".to_string(),
            });
        }
        Ok(self.store.list_by_location(location_id).await?)
    }

    /// Resolves the actor and checks it may mutate orders.
    async fn mutating_actor(&self, user_id: UserId) -> Result<Actor> {
        let actor = self.identity.get_actor(user_id).await?;
        if !actor.role.can_mutate_orders() {
            return Err(ReconcileError::Forbidden {
                reason: format!("role {} may not modify orders", actor.role),
            });
        }
        Ok(actor)
    }

    async fn load_scoped(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(ReconcileError::OrderNotFound(order_id))?;
        if order.business_id() != actor.business_id {
            return Err(ReconcileError::Forbidden {
                reason: "order belongs to another business".to_string(),
            });
        }
        Ok(order)
    }

    /// Shared load-mutate-persist cycle with a single conflict retry.
    ///
    /// The mutation closure runs against freshly loaded state on each
    /// attempt, so increment-based fields are never computed from a stale
    /// read.
    async fn mutate<F>(
        &self,
        user_id: UserId,
        order_id: OrderId,
        action: &'static str,
        notes: Option<String>,
        op: F,
    ) -> Result<Order>
    where
        F: Fn(&mut Order) -> std::result::Result<(), OrderError>,
    {
        let start = std::time::Instant::now();
        let actor = self.mutating_actor(user_id).await?;
        let mut retried = false;

        loop {
            let mut order = self.load_scoped(&actor, order_id).await?;
            let previous = order.status();

            op(&mut order)?;

            let entry = HistoryEntry::new(
                order_id,
                user_id,
                action,
                Some(previous),
                order.status(),
                notes.clone(),
            );

            match self.store.update(&order, &entry).await {
                Ok(version) => {
                    order.set_version(version);
                    metrics::histogram!("reconcile_operation_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    return Ok(order);
                }
                Err(StoreError::VersionConflict { .. }) if !retried => {
                    retried = true;
                    metrics::counter!("reconcile_conflict_retries_total").increment(1);
                    tracing::warn!(%order_id, "version conflict, retrying against fresh state");
                    continue;
                }
                Err(StoreError::VersionConflict { .. }) => {
                    return Err(ReconcileError::ConflictingUpdate(order_id));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
