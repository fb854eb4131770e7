use async_trait::async_trait;
use common::OrderId;
use domain::{Order, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderStoreError, Result, StatusQuery,
    query::MAX_LIMIT,
    store::OrderStore,
};

const ORDER_COLUMNS: &str = "order_id, created_at, customer_id, items, total_cents, status, \
                             updated_at, payment_reference, failure_reason, idempotency_key";

/// PostgreSQL-backed order store implementation.
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

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status_str: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_str).ok_or_else(|| {
            OrderStoreError::Serialization(serde_json::Error::io(std::io::Error::other(format!(
                "unknown order status '{status_str}'"
            ))))
        })?;
        let items_json: serde_json::Value = row.try_get("items")?;

        Ok(Order {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            created_at: row.try_get("created_at")?,
            customer_id: domain::CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            items: serde_json::from_value(items_json)?,
            total_amount: domain::Money::from_cents(row.try_get("total_cents")?),
            status,
            updated_at: row.try_get("updated_at")?,
            payment_reference: row.try_get("payment_reference")?,
            failure_reason: row.try_get("failure_reason")?,
            idempotency_key: row.try_get("idempotency_key")?,
        })
    }

    async fn fetch(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create(&self, order: &Order) -> Result<()> {
        let items_json = serde_json::to_value(&order.items)?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (order_id, created_at, customer_id, items, total_cents, status,
                                updated_at, payment_reference, failure_reason, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.order_id.as_uuid())
        .bind(order.created_at)
        .bind(order.customer_id.as_uuid())
        .bind(items_json)
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(&order.payment_reference)
        .bind(&order.failure_reason)
        .bind(&order.idempotency_key)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some("orders_pkey") =>
            {
                Err(OrderStoreError::DuplicateOrder(order.order_id))
            }
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some("orders_idempotency_key_unique") =>
            {
                let key = order.idempotency_key.clone().unwrap_or_default();
                let existing = self
                    .find_by_idempotency_key(&key)
                    .await?
                    .map(|o| o.order_id)
                    .unwrap_or(order.order_id);
                Err(OrderStoreError::IdempotencyConflict { key, existing })
            }
            Err(e) => Err(OrderStoreError::Database(e)),
        }
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.fetch(order_id).await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(skip(self, failure_reason))]
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<Order> {
        if !expected.can_transition_to(next) {
            return Err(OrderStoreError::Transition(
                domain::OrderError::InvalidStateTransition {
                    from: expected,
                    to: next,
                },
            ));
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $3,
                updated_at = now(),
                failure_reason = CASE WHEN $3 = 'FAILED' THEN $4 ELSE failure_reason END
            WHERE order_id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(failure_reason)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => match self.fetch(order_id).await? {
                Some(order) => {
                    metrics::counter!("order_status_conflicts_total").increment(1);
                    Err(OrderStoreError::StatusConflict {
                        order_id,
                        expected,
                        actual: order.status,
                    })
                }
                None => Err(OrderStoreError::NotFound(order_id)),
            },
        }
    }

    async fn set_payment_reference(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        reference: &str,
    ) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET payment_reference = $3
            WHERE order_id = $1
              AND status = $2
              AND (payment_reference IS NULL OR payment_reference = $3)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => match self.fetch(order_id).await? {
                Some(order) if order.status != expected => Err(OrderStoreError::StatusConflict {
                    order_id,
                    expected,
                    actual: order.status,
                }),
                Some(_) => Err(OrderStoreError::PaymentReferenceAlreadySet { order_id }),
                None => Err(OrderStoreError::NotFound(order_id)),
            },
        }
    }

    async fn query_by_status(&self, query: StatusQuery) -> Result<Vec<Order>> {
        let limit = query.limit.min(MAX_LIMIT) as i64;

        let rows = if let Some(cursor) = query.created_before {
            sqlx::query(&format!(
                r#"
                SELECT {ORDER_COLUMNS} FROM orders
                WHERE status = $1 AND created_at < $2
                ORDER BY created_at DESC
                LIMIT $3
                "#
            ))
            .bind(query.status.as_str())
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                r#"
                SELECT {ORDER_COLUMNS} FROM orders
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2
                "#
            ))
            .bind(query.status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit.min(MAX_LIMIT) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}
