//! Status reconciliation core. Nothing in here touches the database.

pub mod date_guard;
pub mod event_log;
pub mod history_recorder;
pub mod reconciler;

pub use date_guard::{clamp_dates, validate_event_date, DateViolation};
pub use event_log::EventLog;
pub use history_recorder::{record_history, TrackedField};
pub use reconciler::{reconcile_on_save, Reconciliation, RejectedEvent, SaveRequest, Signal};
