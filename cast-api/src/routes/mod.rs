pub mod health;
pub mod process;

pub use health::health_handler;
pub use process::{cron_process_handler, manual_process_handler};
