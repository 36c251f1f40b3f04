//! Daemon-level error kinds (SPEC_FULL.md Module K, spec.md section 7) and
//! their conversion into the stable error names spec.md section 6
//! requires clients to see unchanged.

use crate::identity_store::StoreError;
use sbus::MethodErr;

#[derive(Debug, Clone, thiserror::Error)]
pub enum IfpError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("domain {0} not found")]
    DomainNotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("access denied")]
    AccessDenied,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("interface {iface} already registered at {path}")]
    Conflict { path: String, iface: String },
}

impl From<StoreError> for IfpError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(detail) => IfpError::Transient(detail),
        }
    }
}

impl From<IfpError> for MethodErr {
    fn from(err: IfpError) -> Self {
        match err {
            IfpError::NotFound(what) => MethodErr::new(
                "org.freedesktop.identity.Error.NotFound",
                format!("{} not found", what),
            ),
            IfpError::DomainNotFound(domain) => MethodErr::new(
                "org.freedesktop.identity.Error.DomainNotFound",
                format!("Domain {} not found", domain),
            ),
            IfpError::InvalidArgument(detail) => MethodErr::invalid_arg(&detail),
            IfpError::AccessDenied => MethodErr::new(
                "org.freedesktop.identity.Error.AccessDenied",
                "access denied".to_string(),
            ),
            IfpError::Internal(detail) => MethodErr::new(
                "org.freedesktop.identity.Error.Internal",
                detail,
            ),
            IfpError::Transient(detail) => MethodErr::failed(&detail),
            IfpError::Conflict { path, iface } => MethodErr::new(
                "org.freedesktop.identity.Error.Internal",
                format!("interface {} already registered at {}", iface, path),
            ),
        }
    }
}
