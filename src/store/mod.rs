//! Reactive State Store
//!
//! Namespaced key/value state with change notification.
//!
//! ## Architecture
//!
//! ```text
//! set(ns, {k: v}) ──► diff against current ──► Transaction active? ──► buffer
//!                            │                          │
//!                            ▼                          ▼ (no)
//!                      empty diff: stop        notify matching subscribers
//!                                                       │
//!                                                       ▼
//!                                              persist via adapter
//! ```
//!
//! - **Namespaces** are created lazily on first access
//! - **Keys** may be dotted paths (`user.profile.name`)
//! - **Subscribers** filter on keys; a filter matches a change to the key
//!   itself, any ancestor, or any descendant
//! - **Reset/import** notify every subscriber of the namespace
//! - **Derived values** recompute when their dependencies change

mod derived;
mod engine;
mod error;
mod history;
pub mod path;
mod subscription;
mod transaction;

pub use derived::{ComputeFn, DerivedInfo};
pub use engine::{SetOptions, StateStore, StoreConfig, StoreStats, WeakStateStore};
pub use error::{StoreError, StoreResult};
pub use history::{HistoryEntry, DEFAULT_HISTORY_LIMIT};
pub use path::{KeyPath, PathError};
pub use subscription::{Callback, ChangeKind, StateChange, SubscriptionId};
pub use transaction::Transaction;
