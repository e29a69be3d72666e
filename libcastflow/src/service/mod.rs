//! Service layer shared by the Cast Flow binaries
//!
//! Every trigger (the `cast-send` daemon, the cron route and the manual route
//! in `cast-api`) drives the same [`Publisher`].

pub mod publishing;

pub use publishing::Publisher;
