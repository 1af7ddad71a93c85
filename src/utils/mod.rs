pub mod cache;
pub mod time;
