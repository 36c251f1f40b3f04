//! The identity store seam (spec.md section 1: "used via opaque query
//! functions", SPEC_FULL.md Module H).
//!
//! Field names follow the `SYSDB_*` keys `ifp_users.c` reads
//! (`SYSDB_NAME`, `SYSDB_UIDNUM`, `SYSDB_GIDNUM`, `SYSDB_GECOS`,
//! `SYSDB_HOMEDIR`, `SYSDB_SHELL`), translated to idiomatic field names.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("identity store unavailable: {0}")]
    Transient(String),
}

#[derive(Debug, Clone)]
pub struct UserEntry {
    pub uid: u32,
    pub gid: u32,
    pub name: String,
    pub gecos: String,
    pub home_directory: String,
    pub login_shell: String,
}

#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub gid: u32,
    pub name: String,
    pub members: Vec<String>,
}

/// The opaque collaborator the users/groups façades query. Modeled as a
/// trait, not a concrete client, because spec.md section 1 puts the real
/// backing store's internals explicitly out of scope.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn user_by_name(&self, domain: &str, name: &str) -> Result<Option<UserEntry>, StoreError>;
    async fn user_by_uid(&self, domain: &str, uid: u32) -> Result<Option<UserEntry>, StoreError>;
    /// Groups the named user belongs to (mirrors an `initgroups` call).
    async fn initgroups(&self, domain: &str, username: &str) -> Result<Vec<GroupEntry>, StoreError>;
    async fn refresh_groups(&self, domain: &str, username: &str) -> Result<(), StoreError>;
    async fn user_extra_attrs(
        &self,
        domain: &str,
        uid: u32,
        attrs: &[String],
    ) -> Result<HashMap<String, Vec<String>>, StoreError>;
    async fn group_by_name(&self, domain: &str, name: &str) -> Result<Option<GroupEntry>, StoreError>;
    async fn group_by_gid(&self, domain: &str, gid: u32) -> Result<Option<GroupEntry>, StoreError>;
}

/// In-memory `IdentityStore` for tests, grounded in how `dbus-crossroads`'s
/// own test module wires a fake `Crossroads` to exercise dispatch without a
/// live bus.
#[derive(Default)]
pub struct MockIdentityStore {
    users: Mutex<HashMap<(String, u32), UserEntry>>,
    groups: Mutex<HashMap<(String, u32), GroupEntry>>,
    memberships: Mutex<HashMap<(String, String), Vec<u32>>>,
    extra_attrs: Mutex<HashMap<(String, u32), HashMap<String, Vec<String>>>>,
}

impl MockIdentityStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_user(&self, domain: &str, user: UserEntry) {
        self.users
            .lock()
            .unwrap()
            .insert((domain.to_string(), user.uid), user);
    }

    pub fn add_group(&self, domain: &str, group: GroupEntry) {
        self.groups
            .lock()
            .unwrap()
            .insert((domain.to_string(), group.gid), group);
    }

    pub fn set_memberships(&self, domain: &str, username: &str, gids: Vec<u32>) {
        self.memberships
            .lock()
            .unwrap()
            .insert((domain.to_string(), username.to_string()), gids);
    }

    pub fn set_extra_attrs(&self, domain: &str, uid: u32, attrs: HashMap<String, Vec<String>>) {
        self.extra_attrs
            .lock()
            .unwrap()
            .insert((domain.to_string(), uid), attrs);
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn user_by_name(&self, domain: &str, name: &str) -> Result<Option<UserEntry>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|((d, _), u)| d == domain && u.name == name)
            .map(|(_, u)| u.clone()))
    }

    async fn user_by_uid(&self, domain: &str, uid: u32) -> Result<Option<UserEntry>, StoreError> {
        Ok(self.users.lock().unwrap().get(&(domain.to_string(), uid)).cloned())
    }

    async fn initgroups(&self, domain: &str, username: &str) -> Result<Vec<GroupEntry>, StoreError> {
        let gids = self
            .memberships
            .lock()
            .unwrap()
            .get(&(domain.to_string(), username.to_string()))
            .cloned()
            .unwrap_or_default();
        let groups = self.groups.lock().unwrap();
        Ok(gids
            .into_iter()
            .filter_map(|gid| groups.get(&(domain.to_string(), gid)).cloned())
            .collect())
    }

    async fn refresh_groups(&self, domain: &str, username: &str) -> Result<(), StoreError> {
        if self.user_by_name(domain, username).await?.is_none() {
            return Err(StoreError::Transient(format!("no such user {}", username)));
        }
        Ok(())
    }

    async fn user_extra_attrs(
        &self,
        domain: &str,
        uid: u32,
        attrs: &[String],
    ) -> Result<HashMap<String, Vec<String>>, StoreError> {
        let stored = self
            .extra_attrs
            .lock()
            .unwrap()
            .get(&(domain.to_string(), uid))
            .cloned()
            .unwrap_or_default();
        Ok(stored
            .into_iter()
            .filter(|(k, _)| attrs.contains(k))
            .collect())
    }

    async fn group_by_name(&self, domain: &str, name: &str) -> Result<Option<GroupEntry>, StoreError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .iter()
            .find(|((d, _), g)| d == domain && g.name == name)
            .map(|(_, g)| g.clone()))
    }

    async fn group_by_gid(&self, domain: &str, gid: u32) -> Result<Option<GroupEntry>, StoreError> {
        Ok(self.groups.lock().unwrap().get(&(domain.to_string(), gid)).cloned())
    }
}
