pub mod application_service;
pub mod export_service;
pub mod history_service;
pub mod notification_service;
pub mod profile_service;
pub mod reference_service;
pub mod reminder_service;
pub mod status_event_service;
pub mod template_service;
