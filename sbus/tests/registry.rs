//! Integration coverage for the registration/lookup properties and the
//! six numbered scenarios in spec.md section 8, exercised against
//! [`sbus::Connection`] end to end rather than [`sbus::Registry`] alone.

use sbus::connection::{Connection, Transport, TransportError};
use sbus::iface::InterfaceBuilder;
use sbus::RegistryError;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingTransport {
    objects: Mutex<Vec<String>>,
    fallbacks: Mutex<Vec<String>>,
    unregistered: Mutex<Vec<String>>,
}

impl Transport for RecordingTransport {
    fn register_object(&self, path: &str) -> Result<(), TransportError> {
        self.objects.lock().unwrap().push(path.to_string());
        Ok(())
    }
    fn register_fallback(&self, base_path: &str) -> Result<(), TransportError> {
        self.fallbacks.lock().unwrap().push(base_path.to_string());
        Ok(())
    }
    fn unregister(&self, path: &str) {
        self.unregistered.lock().unwrap().push(path.to_string());
    }
}

// Scenario 1 (spec.md section 8): registering an interface at a fresh path
// installs exactly one transport registration, and that path resolves.
#[test]
fn scenario_fresh_registration_resolves() {
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());
    conn.register_interface(
        "/org/example/Users",
        InterfaceBuilder::new("com.example.Users").build(),
        Arc::new(()),
    )
    .unwrap();
    assert!(conn.registry().has_supported("/org/example/Users"));
    assert_eq!(transport.objects.lock().unwrap().len(), 1);
}

// Scenario 2: a subtree registration answers lookups for any descendant,
// not only its own base path.
#[test]
fn scenario_subtree_covers_descendants() {
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport);
    conn.register_interface(
        "/org/example/Users/*",
        InterfaceBuilder::new("com.example.Users").build(),
        Arc::new(()),
    )
    .unwrap();
    assert!(conn.registry().has_supported("/org/example/Users/dom/1000"));
    assert!(conn
        .registry()
        .lookup_iface("/org/example/Users/dom/1000", "com.example.Users")
        .is_some());
}

// Scenario 3: an interface registered at a more specific path wins over one
// registered on an ancestor subtree.
#[test]
fn scenario_nearest_registration_wins() {
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport);
    conn.register_interface(
        "/org/example/Users/*",
        InterfaceBuilder::new("com.example.Users").build(),
        Arc::new(1u32),
    )
    .unwrap();
    conn.register_interface(
        "/org/example/Users/dom/1000",
        InterfaceBuilder::new("com.example.Users").build(),
        Arc::new(2u32),
    )
    .unwrap();
    let (_iface, data) = conn
        .registry()
        .lookup_iface("/org/example/Users/dom/1000", "com.example.Users")
        .unwrap();
    assert_eq!(*data.downcast::<u32>().unwrap(), 2u32);
}

// Scenario 4: duplicate interface registration at the same path is rejected
// and the original registration keeps working.
#[test]
fn scenario_duplicate_rejected_original_survives() {
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport);
    conn.register_interface("/a", InterfaceBuilder::new("com.example.A").build(), Arc::new(()))
        .unwrap();
    let err = conn
        .register_interface("/a", InterfaceBuilder::new("com.example.A").build(), Arc::new(()))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate { .. }));
    assert!(conn.registry().lookup_iface("/a", "com.example.A").is_some());
}

// Scenario 5: an object path registration is superseded by a later subtree
// registration on the same base, and the transport ends up holding only
// the fallback (invariant 3, spec.md section 3).
#[test]
fn scenario_subtree_supersedes_object_registration() {
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());
    conn.register_interface("/a", InterfaceBuilder::new("com.example.A").build(), Arc::new(()))
        .unwrap();
    conn.register_interface("/a/*", InterfaceBuilder::new("com.example.B").build(), Arc::new(()))
        .unwrap();
    assert_eq!(transport.unregistered.lock().unwrap().as_slice(), &["/a".to_string()]);
    assert_eq!(transport.fallbacks.lock().unwrap().as_slice(), &["/a".to_string()]);
}

// Scenario 6: after a reconnect, re-registering everything restores the
// transport's view without touching the in-memory registry's contents.
#[test]
fn scenario_reregister_all_restores_transport_state() {
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());
    conn.register_interface("/a", InterfaceBuilder::new("com.example.A").build(), Arc::new(()))
        .unwrap();
    conn.register_interface(
        "/b/*",
        InterfaceBuilder::new("com.example.B").build(),
        Arc::new(()),
    )
    .unwrap();
    transport.objects.lock().unwrap().clear();
    transport.fallbacks.lock().unwrap().clear();

    conn.reregister_all();

    assert_eq!(transport.objects.lock().unwrap().as_slice(), &["/a".to_string()]);
    assert_eq!(transport.fallbacks.lock().unwrap().as_slice(), &["/b".to_string()]);
    assert!(conn.registry().lookup_iface("/a", "com.example.A").is_some());
    assert!(conn
        .registry()
        .lookup_iface("/b/anything", "com.example.B")
        .is_some());
}
