use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::StoreError;
use super::value_objects::OrderNumber;

// ============================================================================
// Order Index - per-customer read model
// ============================================================================
//
// The event store answers "what is order X"; this answers "which orders does
// customer Y have", newest first. Written once when an order is created.
//
// ============================================================================

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIndexEntry {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub order_number: OrderNumber,
    pub created_at: DateTime<Utc>,
}

/// 1-based page request with `per_page` clamped to `[1, MAX_PER_PAGE]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }
}

#[derive(Debug, Clone)]
pub struct IndexPage {
    pub entries: Vec<OrderIndexEntry>,
    pub total: u64,
}

#[async_trait]
pub trait OrderIndex: Send + Sync {
    async fn record(&self, entry: OrderIndexEntry) -> Result<(), StoreError>;

    async fn list_for_customer(&self, customer_id: Uuid, page: PageRequest) -> Result<IndexPage, StoreError>;
}

// ============================================================================
// In-Memory Index
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderIndex {
    by_customer: RwLock<HashMap<Uuid, Vec<OrderIndexEntry>>>,
}

impl InMemoryOrderIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderIndex for InMemoryOrderIndex {
    async fn record(&self, entry: OrderIndexEntry) -> Result<(), StoreError> {
        let mut by_customer = self.by_customer.write().await;
        let entries = by_customer.entry(entry.customer_id).or_default();

        if !entries.iter().any(|existing| existing.order_id == entry.order_id) {
            entries.push(entry);
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.order_id.cmp(&a.order_id)));
        }
        Ok(())
    }

    async fn list_for_customer(&self, customer_id: Uuid, page: PageRequest) -> Result<IndexPage, StoreError> {
        let by_customer = self.by_customer.read().await;
        let entries = by_customer.get(&customer_id).map(Vec::as_slice).unwrap_or_default();

        Ok(IndexPage {
            entries: entries.iter().skip(page.offset()).take(page.per_page as usize).cloned().collect(),
            total: entries.len() as u64,
        })
    }
}

// ============================================================================
// ScyllaDB Index
// ============================================================================

const CREATE_INDEX_TABLE: &str = "CREATE TABLE IF NOT EXISTS orders_by_customer (
    customer_id uuid,
    created_at timestamp,
    order_id uuid,
    order_number text,
    PRIMARY KEY (customer_id, created_at, order_id)
) WITH CLUSTERING ORDER BY (created_at DESC, order_id DESC)";

fn backend<Err: std::fmt::Display>(err: Err) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub async fn ensure_index_schema(session: &Session) -> Result<(), StoreError> {
    session.query_unpaged(CREATE_INDEX_TABLE, &[]).await.map_err(backend)?;
    Ok(())
}

pub struct ScyllaOrderIndex {
    session: Arc<Session>,
}

impl ScyllaOrderIndex {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl OrderIndex for ScyllaOrderIndex {
    async fn record(&self, entry: OrderIndexEntry) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "INSERT INTO orders_by_customer (customer_id, created_at, order_id, order_number)
                 VALUES (?, ?, ?, ?)",
                (entry.customer_id, entry.created_at, entry.order_id, entry.order_number.0),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn list_for_customer(&self, customer_id: Uuid, page: PageRequest) -> Result<IndexPage, StoreError> {
        // Clustering order already yields newest first; read up to the end of the page.
        let limit = (page.offset() + page.per_page as usize) as i32;
        let result = self.session
            .query_unpaged(
                "SELECT order_id, order_number, created_at FROM orders_by_customer
                 WHERE customer_id = ? LIMIT ?",
                (customer_id, limit),
            )
            .await
            .map_err(backend)?;

        let mut entries = Vec::new();
        let rows_result = result.into_rows_result().map_err(backend)?;
        for row in rows_result.rows::<(Uuid, String, DateTime<Utc>)>().map_err(backend)?.skip(page.offset()) {
            let (order_id, order_number, created_at) = row.map_err(backend)?;
            entries.push(OrderIndexEntry {
                order_id,
                customer_id,
                order_number: OrderNumber(order_number),
                created_at,
            });
        }

        let total = self.session
            .query_unpaged("SELECT COUNT(*) FROM orders_by_customer WHERE customer_id = ?", (customer_id,))
            .await
            .map_err(backend)?
            .into_rows_result()
            .map_err(backend)?
            .maybe_first_row::<(i64,)>()
            .map_err(backend)?
            .map_or(0, |(count,)| count.max(0) as u64);

        Ok(IndexPage { entries, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(customer_id: Uuid, created_at: DateTime<Utc>) -> OrderIndexEntry {
        OrderIndexEntry {
            order_id: Uuid::new_v4(),
            customer_id,
            order_number: OrderNumber::generate(created_at),
            created_at,
        }
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, per_page: 20 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, per_page: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).per_page, 100);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[tokio::test]
    async fn test_lists_newest_first_per_customer() {
        let index = InMemoryOrderIndex::new();
        let customer = Uuid::new_v4();
        let now = Utc::now();

        let oldest = entry(customer, now - Duration::hours(2));
        let newest = entry(customer, now);
        let middle = entry(customer, now - Duration::hours(1));
        for e in [oldest.clone(), newest.clone(), middle.clone()] {
            index.record(e).await.unwrap();
        }
        index.record(entry(Uuid::new_v4(), now)).await.unwrap();

        let first = index.list_for_customer(customer, PageRequest::new(Some(1), Some(2))).await.unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.entries, vec![newest, middle]);

        let second = index.list_for_customer(customer, PageRequest::new(Some(2), Some(2))).await.unwrap();
        assert_eq!(second.entries, vec![oldest]);
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let index = InMemoryOrderIndex::new();
        let e = entry(Uuid::new_v4(), Utc::now());

        index.record(e.clone()).await.unwrap();
        index.record(e.clone()).await.unwrap();

        let page = index.list_for_customer(e.customer_id, PageRequest::new(None, None)).await.unwrap();
        assert_eq!(page.total, 1);
    }
}
