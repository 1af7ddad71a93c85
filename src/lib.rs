pub mod config;
pub mod database;
pub mod domain;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use reqwest::Client;
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::{
    application_service::ApplicationService, history_service::HistoryService,
    notification_service::NotificationService, profile_service::ProfileService,
    reference_service::ReferenceService, reminder_service::ReminderService,
    status_event_service::StatusEventService, template_service::TemplateService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub application_service: ApplicationService,
    pub status_event_service: StatusEventService,
    pub history_service: HistoryService,
    pub reference_service: ReferenceService,
    pub notification_service: NotificationService,
    pub profile_service: ProfileService,
    pub template_service: TemplateService,
    pub reminder_service: ReminderService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> error::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            application_service: ApplicationService::new(pool.clone()),
            status_event_service: StatusEventService::new(pool.clone()),
            history_service: HistoryService::new(pool.clone()),
            reference_service: ReferenceService::new(
                pool.clone(),
                Duration::from_secs(config.reference_cache_ttl_secs),
            ),
            notification_service: NotificationService::new(pool.clone()),
            profile_service: ProfileService::new(pool.clone()),
            template_service: TemplateService::new(pool.clone()),
            reminder_service: ReminderService::new(
                pool.clone(),
                ProfileService::new(pool.clone()),
                http_client,
                config.reminder_webhook_url.clone(),
                config.reminder_days_before,
            ),
            pool,
        })
    }
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let base_routes = Router::new().route("/health", get(routes::health::health));

    let api = Router::new()
        .route(
            "/api/applications",
            get(routes::applications::list_applications)
                .post(routes::applications::create_application),
        )
        .route(
            "/api/applications/stats",
            get(routes::applications::application_stats),
        )
        .route(
            "/api/applications/export",
            get(routes::export::export_applications),
        )
        .route(
            "/api/applications/:id",
            get(routes::applications::get_application)
                .patch(routes::applications::update_application)
                .delete(routes::applications::delete_application),
        )
        .route(
            "/api/applications/:id/export",
            get(routes::export::export_application),
        )
        .route(
            "/api/applications/:id/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route(
            "/api/applications/:id/events/latest",
            get(routes::events::latest_event),
        )
        .route(
            "/api/applications/:id/events/:event_id",
            delete(routes::events::delete_event),
        )
        .route(
            "/api/applications/:id/history",
            get(routes::history::list_history),
        )
        .route(
            "/api/categories",
            get(routes::references::list_categories).post(routes::references::create_category),
        )
        .route(
            "/api/categories/:id",
            delete(routes::references::delete_category),
        )
        .route(
            "/api/tags",
            get(routes::references::list_tags).post(routes::references::create_tag),
        )
        .route("/api/tags/:id", delete(routes::references::delete_tag))
        .route(
            "/api/notifications",
            get(routes::notifications::list_notifications)
                .delete(routes::notifications::delete_all_notifications),
        )
        .route(
            "/api/notifications/read-all",
            post(routes::notifications::mark_all_notifications_read),
        )
        .route(
            "/api/notifications/:id",
            delete(routes::notifications::delete_notification),
        )
        .route(
            "/api/notifications/:id/read",
            post(routes::notifications::mark_notification_read),
        )
        .route(
            "/api/profile",
            get(routes::profile::get_profile).patch(routes::profile::update_profile),
        )
        .route(
            "/api/templates",
            get(routes::templates::list_templates).post(routes::templates::create_template),
        )
        .route(
            "/api/templates/:id",
            get(routes::templates::get_template)
                .patch(routes::templates::update_template)
                .delete(routes::templates::delete_template),
        )
        .route(
            "/api/templates/:id/applications",
            post(routes::templates::create_from_template),
        )
        .route_layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(config.api_rps),
            middleware::rate_limit::rps_middleware,
        ));

    base_routes
        .merge(api)
        .with_state(state)
        .layer(middleware::cors::api_cors())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
}
