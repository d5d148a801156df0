#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: public items carry docs where the name is not enough.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Color channels and luminance are bounded before every cast.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Pattern matching: these pedantic lints often reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::collapsible_match)]
//
// Low-value pedantic lints that add noise:
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)] // Modifier keys are naturally a set of flags
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::unused_self)]

//! Read-state tracking for thread-like links.
//!
//! A [`Classifier`] decides which anchors are worth tracking, [`derive_key`] maps their
//! URLs to storage keys, a [`ReadStore`] persists visit records and rings other tabs
//! through a [`SyncBus`], and the [`Engine`] ties it together over a [`Document`],
//! marking read links through the [`StyleManager`].

/// The read-trail crate version (matches `Cargo.toml`).
pub const READ_TRAIL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod classify;
pub mod constants;
pub mod dom;
pub mod effects;
pub mod engine;
pub mod error;
pub mod keys;
pub mod store;
pub mod types;

pub use classify::{Classifier, is_date_string};
pub use dom::{Document, ElementRef, MutationRecord, NodeId, SelectorList};
pub use effects::{StyleManager, ThemeColors};
pub use engine::{Engine, EngineState, Modifiers, MouseButton, PageEvent};
pub use error::{Result, TrailError};
pub use keys::{derive_key, extract_domain, hash_code};
pub use store::{
    Bucket, FileBackend, MemoryBackend, PersistenceBackend, ReadStore, StorageEvent, SyncBus,
    SyncListener, SyncPort,
};
pub use types::{KeyScheme, ReadRecord, SelectorGroups, SyncSignal, TrailConfig, UrlPatterns};
