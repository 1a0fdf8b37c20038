pub mod aggregate;
pub mod layout;
pub mod log_line;
pub mod models;
pub mod rates;
pub mod schedule;
