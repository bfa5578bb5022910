use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{
    Address, OrderAggregate, OrderItem, OrderNumber, OrderStatus, PageRequest, PaymentMethod, PaymentStatus,
};
use crate::domain::pricing::OrderTotals;
use crate::services::{OrderPage, PlaceOrder, ReasonRequest, RequestContext, ServiceError, UpdateStatus};
use super::AppState;

/// Order as clients see it. The intent's client secret is only ever handed
/// out by the intent endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_transaction_id: Option<String>,
    pub active_intent_id: Option<String>,
    pub items: Vec<OrderItem>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub cancelled_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl From<OrderAggregate> for OrderView {
    fn from(order: OrderAggregate) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            customer_id: order.customer_id,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            payment_transaction_id: order.payment_transaction_id,
            active_intent_id: order.active_intent.map(|intent| intent.gateway_intent_id),
            items: order.items,
            totals: order.totals,
            currency: order.currency,
            coupon_code: order.coupon_code,
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            notes: order.notes,
            tracking_number: order.tracking_number,
            carrier: order.carrier,
            cancelled_reason: order.cancelled_reason,
            failure_reason: order.failure_reason,
            created_at: order.created_at,
            updated_at: order.updated_at,
            paid_at: order.paid_at,
            version: order.version,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPageView {
    pub orders: Vec<OrderView>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl From<OrderPage> for OrderPageView {
    fn from(page: OrderPage) -> Self {
        Self {
            orders: page.orders.into_iter().map(OrderView::from).collect(),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn order_json(order: OrderAggregate) -> HttpResponse {
    HttpResponse::Ok().json(OrderView::from(order))
}

fn reason(body: Option<web::Json<ReasonRequest>>) -> ReasonRequest {
    body.map(web::Json::into_inner).unwrap_or_default()
}

pub async fn place_order(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<PlaceOrder>,
) -> Result<HttpResponse, ServiceError> {
    let order = state.services.checkout.place_order(&ctx, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(OrderView::from(order)))
}

pub async fn list_orders(
    state: web::Data<AppState>,
    ctx: RequestContext,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let page = PageRequest::new(query.page, query.per_page);
    let orders = state.services.orders.list(&ctx, page).await?;
    Ok(HttpResponse::Ok().json(OrderPageView::from(orders)))
}

pub async fn get_order(
    state: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    Ok(order_json(state.services.orders.get(&ctx, path.into_inner()).await?))
}

pub async fn cancel_order(
    state: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<Uuid>,
    body: Option<web::Json<ReasonRequest>>,
) -> Result<HttpResponse, ServiceError> {
    let order = state.services.orders.cancel(&ctx, path.into_inner(), reason(body)).await?;
    Ok(order_json(order))
}

pub async fn update_status(
    state: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStatus>,
) -> Result<HttpResponse, ServiceError> {
    let order = state
        .services
        .orders
        .update_status(&ctx, path.into_inner(), body.into_inner())
        .await?;
    Ok(order_json(order))
}

pub async fn refund_order(
    state: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<Uuid>,
    body: Option<web::Json<ReasonRequest>>,
) -> Result<HttpResponse, ServiceError> {
    let order = state.services.orders.refund(&ctx, path.into_inner(), reason(body)).await?;
    Ok(order_json(order))
}

pub async fn activate_warranty(
    state: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    Ok(order_json(state.services.warranty.activate(&ctx, path.into_inner()).await?))
}
