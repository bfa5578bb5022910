use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::domain::order::PaymentStatus;
use crate::services::{ConfirmPayment, CreateIntent, RequestContext, ServiceError};
use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmationView {
    payment_status: PaymentStatus,
}

pub async fn create_intent(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<CreateIntent>,
) -> Result<HttpResponse, ServiceError> {
    let handle = state.services.payments.create_intent(&ctx, body.order_id).await?;
    Ok(HttpResponse::Ok().json(handle))
}

pub async fn confirm_payment(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<ConfirmPayment>,
) -> Result<HttpResponse, ServiceError> {
    let payment_status = state.services.payments.confirm_payment(&ctx, &body.gateway_intent_id).await?;
    Ok(HttpResponse::Ok().json(ConfirmationView { payment_status }))
}
