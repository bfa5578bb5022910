use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::{Cart, CartItem, CartLineKey};
use crate::services::{AddToCart, QuoteRequest, RequestContext, ServiceError};
use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub revision: u64,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            subtotal: cart.subtotal(),
            revision: cart.revision,
            items: cart.items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLine {
    #[serde(flatten)]
    pub key: CartLineKey,
    pub quantity: i64,
}

pub async fn get_cart(state: web::Data<AppState>, ctx: RequestContext) -> HttpResponse {
    HttpResponse::Ok().json(CartView::from(state.services.cart.get(&ctx).await))
}

pub async fn add_item(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<AddToCart>,
) -> Result<HttpResponse, ServiceError> {
    let cart = state.services.cart.add_item(&ctx, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(CartView::from(cart)))
}

pub async fn update_item(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<UpdateLine>,
) -> Result<HttpResponse, ServiceError> {
    let cart = state.services.cart.update_quantity(&ctx, &body.key, body.quantity).await?;
    Ok(HttpResponse::Ok().json(CartView::from(cart)))
}

pub async fn remove_item(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<CartLineKey>,
) -> Result<HttpResponse, ServiceError> {
    let cart = state.services.cart.remove_item(&ctx, &body).await?;
    Ok(HttpResponse::Ok().json(CartView::from(cart)))
}

pub async fn clear_cart(state: web::Data<AppState>, ctx: RequestContext) -> HttpResponse {
    HttpResponse::Ok().json(CartView::from(state.services.cart.clear(&ctx).await))
}

pub async fn quote(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: Option<web::Json<QuoteRequest>>,
) -> Result<HttpResponse, ServiceError> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let quote = state.services.checkout.quote(&ctx, request).await?;
    Ok(HttpResponse::Ok().json(quote))
}
