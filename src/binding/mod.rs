//! Component Bindings
//!
//! Per-consumer facade over a [`StateStore`](crate::store::StateStore).
//!
//! - **connect**: resolves a namespace, seeds initial state, configures
//!   persistence and mirrors shared keys through `global`
//! - **Lifecycle**: cleanup tasks run when the binding is torn down
//! - **Inputs**: typed coercion of form control events
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use statehub::binding::{connect, ConnectOptions};
//! use statehub::store::StateStore;
//!
//! let store = StateStore::in_memory();
//! let header = connect(&store, "header", ConnectOptions::new().shared_keys(["theme"])).unwrap();
//! let footer = connect(&store, "footer", ConnectOptions::new().shared_keys(["theme"])).unwrap();
//!
//! header.set("theme", "dark").unwrap();
//! assert_eq!(footer.get("theme"), Some(json!("dark")));
//! ```

mod component;
mod inputs;
mod lifecycle;

pub use component::{connect, ComponentBinding, ConnectOptions, GLOBAL_NAMESPACE};
pub use inputs::{InputEvent, InputHandler, InputKind};
pub use lifecycle::{CleanupTask, Lifecycle};
