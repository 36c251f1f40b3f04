//! Error reply construction.
//!
//! Shaped after `dbus::MethodErr` as used throughout `dbus-tree` and
//! `dbus-crossroads` (see e.g. `dbus-crossroads/src/ifacedesc.rs`'s
//! `MethodErr::no_interface` / `MethodErr::no_method` calls): a D-Bus error
//! name paired with a human-readable message, convertible straight into a
//! method-error reply message.

use dbus::strings::ErrorName;
use dbus::Message;

/// A D-Bus error name plus message, ready to become an error reply.
///
/// Unlike `dbus::MethodErr`, this carries the daemon's own stable error
/// names from spec.md section 6 as associated constructors, rather than
/// generic freedesktop ones, since callers outside `sbus` (the `identityd`
/// interfaces) need the exact strings to match.
#[derive(Debug, Clone)]
pub struct MethodErr {
    name: String,
    message: String,
}

impl MethodErr {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        MethodErr {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn no_interface(iface: &str) -> Self {
        MethodErr::new(
            "org.freedesktop.DBus.Error.UnknownInterface",
            format!("Unknown interface {}", iface),
        )
    }

    pub fn no_method(member: &str) -> Self {
        MethodErr::new(
            "org.freedesktop.DBus.Error.UnknownMethod",
            format!("Unknown method {}", member),
        )
    }

    pub fn invalid_arg(detail: &str) -> Self {
        MethodErr::new("org.freedesktop.DBus.Error.InvalidArgs", detail.to_string())
    }

    pub fn failed(detail: &str) -> Self {
        MethodErr::new("org.freedesktop.DBus.Error.Failed", detail.to_string())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Turns this error into a D-Bus error-reply message for `orig`.
    pub fn to_message(&self, orig: &Message) -> Message {
        let name = ErrorName::new(self.name.clone()).unwrap_or_else(|_| {
            ErrorName::new("org.freedesktop.DBus.Error.Failed".to_string())
                .expect("static error name is valid")
        });
        orig.error(&name, &std::ffi::CString::new(self.message.clone()).unwrap_or_default())
    }
}

impl std::fmt::Display for MethodErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for MethodErr {}

/// Programmer-error outcomes from registry mutation, never surfaced to a
/// bus client directly (spec.md section 7: "Conflict ... returned to the
/// programmer, never to a client").
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("interface {iface} is already registered at {path}")]
    Duplicate { path: String, iface: String },
}
