use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use common::{BusinessId, LineItemId, LocationId, OrderId, UserId, Version};
use domain::{
    CustomerInfo, HistoryEntry, HistoryId, LineItemParts, Money, Order, OrderParts, Quantity,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    HistoryQuery, Result, StoreError,
    store::{HistoryStream, OrderStore, validate_write},
};

/// PostgreSQL-backed order store implementation.
///
/// Orders live in `orders`, line items in `order_items` (cascade-deleted
/// with their order), and the audit trail in `order_history` (insert-only).
/// All writes run in a transaction; the order row carries the version used
/// for optimistic concurrency.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_line(row: &PgRow) -> Result<LineItemParts> {
        let discount_type = row
            .try_get::<Option<String>, _>("discount_type")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("line discount_type: {e}")))?;

        Ok(LineItemParts {
            id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            item_id: common::ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
            name: row.try_get("name")?,
            quantity: Quantity::new(row.try_get::<i32, _>("quantity")? as u32),
            unit_price: Money::from_cents(row.try_get("unit_price")?),
            subtotal: Money::from_cents(row.try_get("subtotal")?),
            discount_amount: Money::from_cents(row.try_get("discount_amount")?),
            discount_type,
            returned_quantity: Quantity::new(row.try_get::<i32, _>("returned_quantity")? as u32),
            refunded_amount: Money::from_cents(row.try_get("refunded_amount")?),
        })
    }

    fn row_to_order(row: &PgRow, lines: Vec<LineItemParts>) -> Result<Order> {
        let status = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("order status: {e}")))?;
        let payment_status = row
            .try_get::<String, _>("payment_status")?
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("payment status: {e}")))?;
        let refund_status = row
            .try_get::<Option<String>, _>("refund_status")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("refund status: {e}")))?;
        let tags_json: serde_json::Value = row.try_get("tags")?;
        let tags = serde_json::from_value(tags_json)
            .map_err(|e| StoreError::Corrupt(format!("order tags: {e}")))?;

        Ok(Order::restore(OrderParts {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number: row.try_get("order_number")?,
            location_id: LocationId::from_uuid(row.try_get::<Uuid, _>("location_id")?),
            business_id: BusinessId::from_uuid(row.try_get::<Uuid, _>("business_id")?),
            customer: CustomerInfo {
                name: row.try_get("customer_name")?,
                phone: row.try_get("customer_phone")?,
                email: row.try_get("customer_email")?,
            },
            order_date: row.try_get("order_date")?,
            status,
            subtotal: Money::from_cents(row.try_get("subtotal")?),
            tax_amount: Money::from_cents(row.try_get("tax_amount")?),
            discount_amount: Money::from_cents(row.try_get("discount_amount")?),
            total_amount: Money::from_cents(row.try_get("total_amount")?),
            payment_status,
            payment_method: row.try_get("payment_method")?,
            paid_amount: Money::from_cents(row.try_get("paid_amount")?),
            remaining_amount: Money::from_cents(row.try_get("remaining_amount")?),
            refund_status,
            refund_reason: row.try_get("refund_reason")?,
            notes: row.try_get("notes")?,
            tags,
            lines,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }

    fn row_to_entry(row: &PgRow) -> Result<HistoryEntry> {
        let previous_status = row
            .try_get::<Option<String>, _>("previous_status")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("history previous_status: {e}")))?;
        let new_status = row
            .try_get::<String, _>("new_status")?
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("history new_status: {e}")))?;

        Ok(HistoryEntry {
            id: HistoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            action: row.try_get("action")?,
            previous_status,
            new_status,
            notes: row.try_get("notes")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    async fn fetch_lines(&self, order_id: OrderId) -> Result<Vec<LineItemParts>> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, name, quantity, unit_price, subtotal,
                   discount_amount, discount_type, returned_quantity, refunded_amount
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_line).collect()
    }

    async fn insert_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entry: &HistoryEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_history (id, order_id, user_id, action, previous_status, new_status, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.order_id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(&entry.action)
        .bind(entry.previous_status.map(|s| s.as_str()))
        .bind(entry.new_status.as_str())
        .bind(&entry.notes)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order, entry: &HistoryEntry) -> Result<()> {
        validate_write(order, entry)?;

        let mut tx = self.pool.begin().await?;

        let tags = serde_json::to_value(order.tags())
            .map_err(|e| StoreError::Corrupt(format!("order tags: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, location_id, business_id,
                customer_name, customer_phone, customer_email,
                order_date, status,
                subtotal, tax_amount, discount_amount, total_amount,
                payment_status, payment_method, paid_amount, remaining_amount,
                refund_status, refund_reason, notes, tags,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number())
        .bind(order.location_id().as_uuid())
        .bind(order.business_id().as_uuid())
        .bind(&order.customer().name)
        .bind(&order.customer().phone)
        .bind(&order.customer().email)
        .bind(order.order_date())
        .bind(order.status().as_str())
        .bind(order.subtotal().cents())
        .bind(order.tax_amount().cents())
        .bind(order.discount_amount().cents())
        .bind(order.total_amount().cents())
        .bind(order.payment_status().as_str())
        .bind(order.payment_method())
        .bind(order.paid_amount().cents())
        .bind(order.remaining_amount().cents())
        .bind(order.refund_status().map(|s| s.as_str()))
        .bind(order.refund_reason())
        .bind(order.notes())
        .bind(tags)
        .bind(order.version().as_i64())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // Unique violation on the order number means the caller should
            // retry with the next candidate.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_order_number_key")
            {
                return StoreError::DuplicateOrderNumber(order.order_number().to_string());
            }
            StoreError::Database(e)
        })?;

        for (position, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, item_id, name, quantity, unit_price, subtotal,
                    discount_amount, discount_type, returned_quantity, refunded_amount, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(line.id().as_uuid())
            .bind(order.id().as_uuid())
            .bind(line.item_id().as_uuid())
            .bind(line.name())
            .bind(line.quantity().get() as i32)
            .bind(line.unit_price().cents())
            .bind(line.subtotal().cents())
            .bind(line.discount_amount().cents())
            .bind(line.discount_type().map(|t| t.as_str()))
            .bind(line.returned_quantity().get() as i32)
            .bind(line.refunded_amount().cents())
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        Self::insert_history(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, order: &Order, entry: &HistoryEntry) -> Result<Version> {
        validate_write(order, entry)?;

        let expected = order.version();
        let new_version = expected.next();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = $3, payment_status = $4, payment_method = $5,
                paid_amount = $6, remaining_amount = $7,
                refund_status = $8, refund_reason = $9, notes = $10,
                version = $11, updated_at = $12
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(expected.as_i64())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.payment_method())
        .bind(order.paid_amount().cents())
        .bind(order.remaining_amount().cents())
        .bind(order.refund_status().map(|s| s.as_str()))
        .bind(order.refund_reason())
        .bind(order.notes())
        .bind(new_version.as_i64())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Either the row moved under us or the order never existed;
            // look at the stored version to tell which.
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                    .bind(order.id().as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;

            return match actual {
                Some(actual) => Err(StoreError::VersionConflict {
                    order_id: order.id(),
                    expected,
                    actual: Version::new(actual),
                }),
                None => Err(StoreError::OrderNotFound(order.id())),
            };
        }

        for line in order.lines() {
            sqlx::query(
                r#"
                UPDATE order_items
                SET returned_quantity = $2, refunded_amount = $3
                WHERE id = $1
                "#,
            )
            .bind(line.id().as_uuid())
            .bind(line.returned_quantity().get() as i32)
            .bind(line.refunded_amount().cents())
            .execute(&mut *tx)
            .await?;
        }

        Self::insert_history(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(new_version)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let lines = self.fetch_lines(order_id).await?;
                Ok(Some(Self::row_to_order(&row, lines)?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_location(&self, location_id: LocationId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE location_id = $1
            ORDER BY order_date DESC
            "#,
        )
        .bind(location_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let lines = self.fetch_lines(order_id).await?;
            orders.push(Self::row_to_order(row, lines)?);
        }
        Ok(orders)
    }

    async fn history(&self, order_id: OrderId) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, user_id, action, previous_status, new_status, notes, created_at
            FROM order_history
            WHERE order_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn query_history(&self, query: HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let mut sql = String::from(
            "SELECT id, order_id, user_id, action, previous_status, new_status, notes, created_at \
             FROM order_history WHERE 1=1",
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_id = ${param_count}"));
        }
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.actions.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND action = ANY(${param_count})"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.order_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.user_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(actions) = query.actions {
            sqlx_query = sqlx_query.bind(actions);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn stream_history(&self) -> Result<HistoryStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, order_id, user_id, action, previous_status, new_status, notes, created_at
            FROM order_history
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_entry(&row),
            Err(e) => Err(StoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn current_version(&self, order_id: OrderId) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(version.map(Version::new))
    }

    async fn sequence_for_day(&self, business_id: BusinessId, day: NaiveDate) -> Result<u32> {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM orders
            WHERE business_id = $1 AND order_date >= $2 AND order_date < $3
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u32)
    }
}
