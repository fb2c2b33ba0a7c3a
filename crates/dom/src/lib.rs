//! Live DOM model for page-watching scripts
//!
//! An arena-backed document that records its own mutations, a CSS selector
//! engine behind the [`ElementMatcher`] seam, and loaders/dumpers for
//! CDP-shaped snapshots.
//!
//! ## Core Design
//!
//! ```text
//! CDP JSON ─→ snapshot ─→ Document { DomArena, MutationQueue }
//!                              │ append / set_attribute / remove
//!                              ↓
//!                     MutationRecord per interested observer
//! ```

pub mod arena;
pub mod document;
pub mod error;
pub mod mutation;
pub mod selector;
pub mod serializer;
pub mod snapshot;
pub mod types;

pub use arena::DomArena;
pub use document::Document;
pub use error::{DomError, Result};
pub use mutation::{MutationRecord, MutationType, ObserveOptions, ObserverId};
pub use selector::{ElementMatcher, Selector};
pub use types::*;
