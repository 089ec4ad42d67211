//! Form input binding
//!
//! Maps raw control events onto typed state values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::str::FromStr;

use crate::store::{SetOptions, StateStore, StoreResult};

/// Kind of form control that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Checkbox,
    Number,
    Range,
    #[default]
    Text,
    Select,
    Textarea,
}

impl FromStr for InputKind {
    type Err = std::convert::Infallible;

    /// Unknown control types coerce like text
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "checkbox" => InputKind::Checkbox,
            "number" => InputKind::Number,
            "range" => InputKind::Range,
            "select" | "select-one" => InputKind::Select,
            "textarea" => InputKind::Textarea,
            _ => InputKind::Text,
        })
    }
}

/// A change event from a control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    #[serde(default)]
    pub kind: InputKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub checked: bool,
}

impl InputEvent {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: InputKind::Text,
            value: value.into(),
            checked: false,
        }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self {
            kind: InputKind::Number,
            value: value.into(),
            checked: false,
        }
    }

    pub fn checkbox(checked: bool) -> Self {
        Self {
            kind: InputKind::Checkbox,
            value: String::new(),
            checked,
        }
    }

    /// Typed value for this event
    pub fn coerce(&self) -> Value {
        match self.kind {
            InputKind::Checkbox => Value::Bool(self.checked),
            InputKind::Number | InputKind::Range => {
                let parsed = self.value.trim().parse::<f64>().unwrap_or(0.0);
                // NaN and infinities have no JSON form
                Number::from_f64(parsed)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::from(0.0))
            }
            _ => Value::String(self.value.clone()),
        }
    }
}

/// Writes coerced events for one field into a namespace key
#[derive(Debug, Clone)]
pub struct InputHandler {
    store: StateStore,
    namespace: String,
    key: String,
}

impl InputHandler {
    pub(crate) fn new(store: StateStore, namespace: &str, key: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Coerce the event and write it through `set`. Returns the written value.
    pub fn handle(&self, event: &InputEvent) -> StoreResult<Value> {
        let value = event.coerce();
        let mut update = Map::new();
        update.insert(self.key.clone(), value.clone());
        self.store
            .set(&self.namespace, Value::Object(update), SetOptions::default())?;
        Ok(value)
    }
}
