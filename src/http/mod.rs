// ============================================================================
// HTTP API (actix-web)
// ============================================================================
//
// JSON in camelCase. The caller identity comes from `X-User-Id` and
// `X-User-Role` (see `context`). Errors render as
// `{"error": "<code>", "message": "..."}`.
//
// ============================================================================

pub mod cart;
pub mod context;
pub mod errors;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::health::{ComponentHealth, HealthReport, HealthStatus};
use crate::metrics::{metrics_handler, Metrics};
use crate::services::Services;

pub struct AppState {
    pub services: Services,
    pub metrics: Arc<Metrics>,
    /// Name of the event store backend, reported on /health
    pub store_backend: String,
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let mut components = vec![ComponentHealth::new("event_store", HealthStatus::Healthy)
        .with_details(state.store_backend.clone())];
    components.extend(state.services.payments.gateway_health().await);

    let report = HealthReport::from_components(components);
    if report.status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(report)
    } else {
        HttpResponse::Ok().json(report)
    }
}

/// Routes and extractor configuration for one worker
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state.metrics.clone()))
            .app_data(state)
            .app_data(errors::json_config())
            .app_data(errors::query_config())
            .app_data(errors::path_config())
            .route("/health", web::get().to(health))
            .route("/metrics", web::get().to(metrics_handler))
            .service(
                web::resource("/cart")
                    .route(web::get().to(cart::get_cart))
                    .route(web::delete().to(cart::clear_cart)),
            )
            .service(
                web::resource("/cart/items")
                    .route(web::post().to(cart::add_item))
                    .route(web::patch().to(cart::update_item))
                    .route(web::delete().to(cart::remove_item)),
            )
            .route("/checkout/quote", web::post().to(cart::quote))
            .service(
                web::resource("/orders")
                    .route(web::get().to(orders::list_orders))
                    .route(web::post().to(orders::place_order)),
            )
            .route("/orders/{id}", web::get().to(orders::get_order))
            .route("/orders/{id}/cancel", web::post().to(orders::cancel_order))
            .route("/orders/{id}/status", web::patch().to(orders::update_status))
            .route("/orders/{id}/refund", web::post().to(orders::refund_order))
            .route("/orders/{id}/warranty/activate", web::post().to(orders::activate_warranty))
            .route("/payments/intents", web::post().to(payments::create_intent))
            .route("/payments/confirm", web::post().to(payments::confirm_payment));
    }
}
