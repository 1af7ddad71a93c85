use std::env;

use chrono::{Duration, Utc};
use job_tracker_backend::{
    dto::application_dto::{CreateApplicationPayload, UpdateApplicationPayload},
    error::Error,
    models::{
        application::ApplicationStatus,
        status_event::{EventKind, NewStatusEvent},
    },
    services::{application_service::ApplicationService, history_service::HistoryService},
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// Runs against the database named by `TEST_DATABASE_URL` and is skipped
/// when it is unset.
#[tokio::test]
async fn save_pipeline_end_to_end() {
    dotenvy::dotenv().ok();
    let Ok(url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let user = Uuid::new_v4();
    let applications = ApplicationService::new(pool.clone());
    let history = HistoryService::new(pool.clone());

    let payload: CreateApplicationPayload = serde_json::from_value(json!({
        "title": "Rust Engineer",
        "employer": "Pied Piper",
        "status": "applied"
    }))
    .expect("payload");
    let created = applications.create(user, payload).await.expect("create");
    let id = created.application.id;

    assert_eq!(created.application.status, ApplicationStatus::Applied);
    assert!(created.application.submitted);
    assert_eq!(created.events.len(), 1);
    assert_eq!(created.events[0].kind, EventKind::ResumeSent);

    let backdated = NewStatusEvent::new(
        EventKind::ConfirmationReceived,
        created.application.created_at - Duration::days(2),
    );
    let err = applications
        .add_event(user, id, backdated)
        .await
        .expect_err("backdated event must fail");
    assert!(matches!(err, Error::Validation(_)));

    let update = UpdateApplicationPayload {
        new_events: vec![NewStatusEvent::new(
            EventKind::RejectionReceived,
            Utc::now() + Duration::minutes(1),
        )],
        ..UpdateApplicationPayload::default()
    };
    let rejected = applications.update(user, id, update).await.expect("update");
    assert_eq!(rejected.application.status, ApplicationStatus::Rejected);
    assert!(rejected.application.rejected);
    assert!(rejected.rejected.is_empty());

    let entries = history.list(user, id).await.expect("history");
    assert!(entries
        .iter()
        .any(|e| e.field_name == "status" && e.old_value == "applied" && e.new_value == "rejected"));

    let rejection_id = rejected
        .events
        .iter()
        .find(|e| e.kind == EventKind::RejectionReceived)
        .map(|e| e.id)
        .expect("rejection event");
    let reverted = applications
        .remove_event(user, id, rejection_id)
        .await
        .expect("remove event");
    assert_eq!(reverted.application.status, ApplicationStatus::Applied);

    let stranger = Uuid::new_v4();
    assert!(matches!(
        applications.detail(stranger, id).await,
        Err(Error::NotFound(_))
    ));

    applications.delete(user, id).await.expect("delete");
}
