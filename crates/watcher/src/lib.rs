//! Page Watchers - wait for a live page to reach a state
//!
//! Callback-based waiters over a [`Page`], the single-threaded host for a
//! [`dom::Document`]:
//!
//! ```text
//! Document mutation ──→ MutationRecord queue ──→ Page::flush ──→ observers
//!                                                                   │
//! Page::dispatch_event ──→ element listeners ───────────────────────┤
//!                                                                   ↓
//!                             registry / available / click / input waiters
//!                                                                   │
//!                                        EventBus (WaiterRegistered, ...)
//! ```
//!
//! # Design
//!
//! 1. **One state per waiter**: composite waiters own their matched set and
//!    fired flag; nothing is global
//! 2. **Callbacks run unborrowed**: user code may query and mutate the page
//!    from inside any callback
//! 3. **Matchers behind a trait**: CSS [`Selector`]s and plain predicates go
//!    through the same [`ElementMatcher`] seam

pub mod available;
pub mod click;
mod composite;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod listener;
pub mod page;
pub mod registry;
pub mod wait;

pub use available::{all_elements_available, on_element_available};
pub use click::{all_elements_click_handled, bind_click, is_click_handled};
pub use composite::{CompositeWaitState, WaitOutcome};
pub use config::WatchConfig;
pub use error::{Result, WatchError};
pub use events::{EventBus, WaiterKind, WatchEvent};
pub use input::on_input_has_value;
pub use listener::{mutation_stream, observe};
pub use page::{Disposition, Event, ListenerId, Page};
pub use registry::{on_attr_changed, on_element_inserted};
pub use wait::{element_available, elements_available, elements_click_handled, input_has_value};

pub use dom::{ElementMatcher, NodeId, Selector};
