pub mod applications;
pub mod events;
pub mod export;
pub mod health;
pub mod history;
pub mod notifications;
pub mod profile;
pub mod references;
pub mod templates;
