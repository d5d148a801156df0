//! Public types exposed by the `read-trail` crate.

pub mod options;
pub mod record;

pub use options::{KeyScheme, SelectorGroups, TrailConfig, UrlPatterns};
pub use record::{ReadRecord, SyncSignal};
