// Logging utilities for the LeoConnect key vault
//
// This module provides:
// - Component-based structured logging on top of the `log` facade
// - Device ID tracking through logger inheritance
// - Optional operation tags so a single vault call can be followed in the logs

use log::{debug, error, info, warn, Level};
use std::fmt::{self, Arguments, Display, Formatter};

/// Predefined components for logging categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Vault,
    Keystore,
    Preferences,
    Cli,
    System,
    Custom(&'static str),
}

impl Component {
    /// Get the string representation of the component
    pub fn as_str(&self) -> &str {
        match self {
            Component::Vault => "Vault",
            Component::Keystore => "Keystore",
            Component::Preferences => "Prefs",
            Component::Cli => "CLI",
            Component::System => "System",
            Component::Custom(name) => name,
        }
    }
}

// Lightweight Display helper to avoid prefix String allocations
struct PrefixDisplay<'a> {
    parent: Option<Component>,
    component: Component,
    operation: Option<&'a str>,
}

impl Display for PrefixDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(parent) if parent != Component::System => {
                write!(f, "{}.{}", parent.as_str(), self.component.as_str())?
            }
            _ => write!(f, "{}", self.component.as_str())?,
        }
        if let Some(op) = self.operation {
            write!(f, "|op={op}")?;
        }
        Ok(())
    }
}

/// A helper for creating component-specific loggers with device ID tracking
#[derive(Clone, Debug)]
pub struct Logger {
    /// Component this logger is for
    component: Component,
    /// Installation identifier used to correlate log lines
    device_id: String,
    /// Parent component for hierarchical logging (if any)
    parent_component: Option<Component>,
    /// Operation currently being traced (e.g. `generate_key_pair`)
    operation: Option<String>,
}

impl Logger {
    /// Create a new root logger for a specific component and device ID
    pub fn new_root(component: Component, device_id: &str) -> Self {
        Self {
            component,
            device_id: device_id.to_string(),
            parent_component: None,
            operation: None,
        }
    }

    /// Create a child logger with the same device ID but a different component
    pub fn with_component(&self, component: Component) -> Self {
        Self {
            component,
            device_id: self.device_id.clone(),
            parent_component: Some(self.component),
            operation: self.operation.clone(),
        }
    }

    /// Create a logger tagged with an operation name
    pub fn with_operation(&self, operation: impl Into<String>) -> Self {
        Self {
            component: self.component,
            device_id: self.device_id.clone(),
            parent_component: self.parent_component,
            operation: Some(operation.into()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// Full prefix including parent component and operation, e.g. `Vault.Keystore|op=clear_keys`
    pub fn prefix(&self) -> String {
        self.prefix_display().to_string()
    }

    fn prefix_display(&self) -> PrefixDisplay<'_> {
        PrefixDisplay {
            parent: self.parent_component,
            component: self.component,
            operation: self.operation(),
        }
    }

    fn emit(&self, level: Level, args: Arguments) {
        if !log::log_enabled!(level) {
            return;
        }
        let prefix = self.prefix_display();
        match level {
            Level::Error => error!("[{}][{}] {}", self.device_id, prefix, args),
            Level::Warn => warn!("[{}][{}] {}", self.device_id, prefix, args),
            Level::Info => info!("[{}][{}] {}", self.device_id, prefix, args),
            Level::Debug | Level::Trace => debug!("[{}][{}] {}", self.device_id, prefix, args),
        }
    }

    /// Log a debug message
    pub fn debug(&self, message: impl Into<String>) {
        if log::log_enabled!(Level::Debug) {
            let message: String = message.into();
            self.emit(Level::Debug, format_args!("{message}"));
        }
    }

    /// Log a debug message using fmt::Arguments (avoids allocating message String)
    pub fn debug_args(&self, args: Arguments) {
        self.emit(Level::Debug, args);
    }

    /// Log an info message
    pub fn info(&self, message: impl Into<String>) {
        if log::log_enabled!(Level::Info) {
            let message: String = message.into();
            self.emit(Level::Info, format_args!("{message}"));
        }
    }

    /// Log an info message using fmt::Arguments
    pub fn info_args(&self, args: Arguments) {
        self.emit(Level::Info, args);
    }

    /// Log a warning message
    pub fn warn(&self, message: impl Into<String>) {
        if log::log_enabled!(Level::Warn) {
            let message: String = message.into();
            self.emit(Level::Warn, format_args!("{message}"));
        }
    }

    /// Log a warning using fmt::Arguments
    pub fn warn_args(&self, args: Arguments) {
        self.emit(Level::Warn, args);
    }

    /// Log an error message
    pub fn error(&self, message: impl Into<String>) {
        if log::log_enabled!(Level::Error) {
            let message: String = message.into();
            self.emit(Level::Error, format_args!("{message}"));
        }
    }

    /// Log an error using fmt::Arguments
    pub fn error_args(&self, args: Arguments) {
        self.emit(Level::Error, args);
    }
}
