use std::collections::HashMap;

use async_trait::async_trait;
use bazaar_core::shipping::ShippingInfo;
use bazaar_order::models::{Order, OrderItem, OrderStatus, StatusHistoryEntry};
use bazaar_order::repository::{OrderRepository, RepoError, StatusChange};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> RepoError {
    RepoError::Backend(err.to_string())
}

fn parse_status(raw: &str) -> Result<OrderStatus, RepoError> {
    raw.parse().map_err(RepoError::Backend)
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_name: String,
    total_amount: i64,
    status: String,
    shipping_address: Value,
    shipping_info: Option<Value>,
    payment_reference: Option<String>,
    fee_snapshot: Option<Value>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepoError> {
        let json_err = |e: serde_json::Error| RepoError::Backend(e.to_string());
        Ok(Order {
            id: self.id,
            customer_name: self.customer_name,
            items,
            total_amount: self.total_amount,
            status: parse_status(&self.status)?,
            shipping_address: serde_json::from_value(self.shipping_address).map_err(json_err)?,
            shipping_info: self
                .shipping_info
                .map(serde_json::from_value)
                .transpose()
                .map_err(json_err)?,
            payment_reference: self.payment_reference,
            fee_snapshot: self
                .fee_snapshot
                .map(serde_json::from_value)
                .transpose()
                .map_err(json_err)?,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    name: String,
    price_at_purchase: i64,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            name: row.name,
            price_at_purchase: row.price_at_purchase,
            quantity: row.quantity,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    order_id: Uuid,
    status: String,
    changed_by: Option<String>,
    changed_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_entry(self) -> Result<StatusHistoryEntry, RepoError> {
        Ok(StatusHistoryEntry {
            id: self.id,
            order_id: self.order_id,
            status: parse_status(&self.status)?,
            changed_by: self.changed_by,
            changed_at: self.changed_at,
        })
    }
}

impl PgOrderRepository {
    async fn fetch_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepoError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, name, price_at_purchase, quantity, created_at
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &Order) -> Result<Uuid, RepoError> {
        let json_err = |e: serde_json::Error| RepoError::Backend(e.to_string());
        let address = serde_json::to_value(&order.shipping_address).map_err(json_err)?;
        let shipping_info = order
            .shipping_info
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(json_err)?;
        let fee_snapshot = order
            .fee_snapshot
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(json_err)?;

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_name, total_amount, status, shipping_address,
                                shipping_info, payment_reference, fee_snapshot, delivered_at,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id)
        .bind(&order.customer_name)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(address)
        .bind(shipping_info)
        .bind(&order.payment_reference)
        .bind(fee_snapshot)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, name, price_at_purchase,
                                         quantity, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.price_at_purchase)
            .bind(item.quantity)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        // The creation state opens the trail
        sqlx::query(
            r#"
            INSERT INTO order_status_history (id, order_id, status, changed_by, changed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(None::<String>)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, customer_name, total_amount, status, shipping_address, shipping_info,
                   payment_reference, fee_snapshot, delivered_at, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let mut items = self.fetch_items(&[id]).await?;
                Ok(Some(row.into_order(items.remove(&id).unwrap_or_default())?))
            }
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepoError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, customer_name, total_amount, status, shipping_address, shipping_info,
                   payment_reference, fee_snapshot, delivered_at, created_at, updated_at
            FROM orders
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut grouped = self.fetch_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let items = grouped.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    async fn transition_order(
        &self,
        id: Uuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> Result<Order, RepoError> {
        let json_err = |e: serde_json::Error| RepoError::Backend(e.to_string());
        let shipping_info = change
            .shipping_info
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(json_err)?;
        let fee_snapshot = change
            .fee_snapshot
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(json_err)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        // The compare-and-set: the WHERE clause carries the status the
        // caller observed. Shipping info stays append-only via COALESCE.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1,
                updated_at = $2,
                shipping_info = COALESCE(shipping_info, $3),
                fee_snapshot = COALESCE($4, fee_snapshot),
                delivered_at = COALESCE($5, delivered_at)
            WHERE id = $6 AND status = $7
            "#,
        )
        .bind(change.status.as_str())
        .bind(now)
        .bind(shipping_info)
        .bind(fee_snapshot)
        .bind(change.delivered_at)
        .bind(id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            // Distinguish a missing order from a lost race
            let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            return Err(match current {
                None => RepoError::NotFound(id),
                Some(raw) => RepoError::Conflict {
                    id,
                    current: parse_status(&raw)?,
                },
            });
        }

        sqlx::query(
            r#"
            INSERT INTO order_status_history (id, order_id, status, changed_by, changed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(change.status.as_str())
        .bind(&change.changed_by)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        self.get_order(id).await?.ok_or(RepoError::NotFound(id))
    }

    async fn attach_shipping_info(&self, id: Uuid, info: &ShippingInfo) -> Result<bool, RepoError> {
        let payload = serde_json::to_value(info).map_err(|e| RepoError::Backend(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET shipping_info = $1, updated_at = $2
            WHERE id = $3 AND shipping_info IS NULL
            "#,
        )
        .bind(payload)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match exists {
            None => Err(RepoError::NotFound(id)),
            Some(_) => Ok(false),
        }
    }

    async fn set_label_url(&self, id: Uuid, label_url: &str) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET shipping_info = jsonb_set(shipping_info, '{label_url}', to_jsonb($1::text)),
                updated_at = $2
            WHERE id = $3 AND shipping_info IS NOT NULL
            "#,
        )
        .bind(label_url)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match exists {
            None => Err(RepoError::NotFound(id)),
            Some(_) => Err(RepoError::Backend(format!(
                "order {id} has no shipping info to label"
            ))),
        }
    }

    async fn get_status_history(&self, id: Uuid) -> Result<Vec<StatusHistoryEntry>, RepoError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, status, changed_by, changed_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY changed_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(HistoryRow::into_entry).collect()
    }
}
