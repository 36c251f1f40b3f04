//! A framework for writing D-Bus method/property handlers against a
//! hierarchical object-path namespace, independent of any particular
//! bus daemon connection implementation.
//!
//! The pieces, each grounded in spec.md section 4:
//!
//! - [`path`] (4.A): object-path parsing, subtree detection, composition.
//! - [`registry`] (4.B): path → interface-set storage with subtree fallback.
//! - [`connection`] (4.C): binds the registry to a transport, handling the
//!   subtree-vs-object registration dance.
//! - [`dispatch`] (4.D): resolves an inbound message to a handler and runs
//!   it, including the async caller-identity suspension point.
//! - [`context`] (4.E): the per-call request state and its "finish exactly
//!   once" invariant.
//! - [`iface`]: the interface/method/property/instance-data model those
//!   pieces operate on.
//! - [`introspect`]: the built-in `Introspectable` support every registered
//!   path gets.
//! - [`error`]: error-reply construction and registry-level errors.

pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod iface;
pub mod introspect;
pub mod path;
pub mod registry;

pub use connection::{Connection, Transport, TransportError};
pub use context::{CallerId, Context};
pub use dispatch::{CallerIdResolver, Dispatcher};
pub use error::{MethodErr, RegistryError};
pub use iface::{Interface, InterfaceBuilder, InstanceData, PropertyValue};
pub use registry::{InsertOutcome, Registry};
