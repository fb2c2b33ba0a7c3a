//! Watcher configuration

use crate::error::{Result, WatchError};
use dom::Selector;
use serde::{Deserialize, Serialize};

/// Names and roots the waiters agree on with the page being watched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Subtree root for insertion watches; the document node if nothing matches
    pub observe_root: String,
    /// Signal dispatched on an element when a click handler is bound to it
    pub click_signal: String,
    /// Attribute set to "true" on elements with a bound click handler
    pub click_marker_attribute: String,
    /// Legacy inline handler attribute
    pub inline_click_attribute: String,
    /// Signals that may carry a new input value
    pub input_signals: Vec<String>,
    pub event_bus_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            observe_root: "body".to_string(),
            click_signal: "click_event_handled".to_string(),
            click_marker_attribute: "click_handled".to_string(),
            inline_click_attribute: "onclick".to_string(),
            input_signals: ["change", "paste", "keyup", "input"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            event_bus_capacity: 1024,
        }
    }
}

impl WatchConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Attribute names as the document stores them (ASCII lowercase)
    pub fn normalized(mut self) -> Self {
        self.click_marker_attribute.make_ascii_lowercase();
        self.inline_click_attribute.make_ascii_lowercase();
        self
    }

    pub fn validate(&self) -> Result<()> {
        Selector::parse(&self.observe_root)?;

        let names = [
            ("click_signal", &self.click_signal),
            ("click_marker_attribute", &self.click_marker_attribute),
            ("inline_click_attribute", &self.inline_click_attribute),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(WatchError::InvalidConfig(format!("{} is empty", field)));
            }
        }

        if self.input_signals.is_empty() {
            return Err(WatchError::InvalidConfig(
                "input_signals must name at least one signal".to_string(),
            ));
        }
        if self.input_signals.iter().any(|s| s.trim().is_empty()) {
            return Err(WatchError::InvalidConfig(
                "input_signals contains an empty name".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(WatchError::InvalidConfig(
                "event_bus_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
