pub mod application_dto;
pub mod event_dto;
pub mod history_dto;
pub mod notification_dto;
pub mod profile_dto;
pub mod reference_dto;
pub mod template_dto;
