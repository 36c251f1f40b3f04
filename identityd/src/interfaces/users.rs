//! The users façade (spec.md section 4.F) — the concrete usage pattern any
//! new object family built on `sbus` replicates. Grounded line-for-line in
//! `original_source/src/responder/ifp/ifp_users.c`: path scheme, the four
//! `FindBy*`/`ListBy*` operations, `UpdateGroupsList`, the eight property
//! getters, `is_attribute_allowed`, groups-via-initgroups, and
//! extra-attributes-via-projection.

use crate::config::{AttributeAllowList, DomainConfig};
use crate::domains::find_domain;
use crate::error::IfpError;
use crate::identity_store::IdentityStore;
use dbus::arg::{RefArg, Variant};
use sbus::context::{CallerId, Context};
use sbus::iface::{InstanceData, PropertyValue};
use sbus::path::{compose, decompose_exact};
use sbus::{Connection, InterfaceBuilder, MethodErr};
use std::collections::HashMap;
use std::sync::Arc;

pub const USERS_IFACE: &str = "org.freedesktop.identity.Users";
pub const USER_IFACE: &str = "org.freedesktop.identity.User";

/// Per-registration state: the identity store, the base paths for users and
/// groups, and the configured extra-attribute allow-list. Shared, via
/// [`InstanceData`], between both the container interface (`Users`,
/// registered at the exact base path) and the per-object interface (`User`,
/// registered as a subtree fallback below it).
pub struct UsersState {
    pub store: Arc<dyn IdentityStore>,
    pub users_base: String,
    pub groups_base: String,
    pub attributes: AttributeAllowList,
    pub domains: Vec<DomainConfig>,
}

/// Registers both the `Users` finder interface at `state.users_base` and the
/// per-object `User` interface as a subtree fallback below it
/// (`{users_base}/*`), mirroring how `ifp_users.c`'s single translation unit
/// implements both the container and per-object vtables.
pub fn register<T: sbus::connection::Transport + 'static>(
    conn: &Connection<T>,
    state: Arc<UsersState>,
) -> Result<(), sbus::RegistryError> {
    let users_base = state.users_base.clone();
    let subtree = format!("{}/*", users_base);
    conn.register_interface(&users_base, users_interface(), state.clone())?;
    conn.register_interface(&subtree, user_interface(), state)?;
    Ok(())
}

fn state_of(data: &InstanceData) -> Arc<UsersState> {
    data.clone()
        .downcast::<UsersState>()
        .expect("Users/User interfaces are always registered with UsersState instance data")
}

/// Mirrors `ifp_users_build_path_from_msg` / the explicit path build in
/// `ifp_users_get_by_name_send`: `{base}/{domain}/{uid}`.
fn build_user_path(base: &str, domain: &str, uid: u32) -> Result<String, IfpError> {
    compose(base, &[domain, &uid.to_string()]).map_err(|e| IfpError::Internal(e.message().to_string()))
}

/// Mirrors `ifp_users_user_get` 's initial path decomposition: split the two
/// trailing segments off the object path, parse the second as a UID, and
/// confirm the domain segment names a configured domain (spec.md section
/// 4.F: "Missing domain → Domain-Not-Found").
fn decompose_user_path(path: &str, base: &str, domains: &[DomainConfig]) -> Result<(String, u32), IfpError> {
    let parts = decompose_exact(path, base, 2)
        .map_err(|e| IfpError::InvalidArgument(e.message().to_string()))?;
    let domain = parts[0].clone();
    find_domain(domains, &domain).ok_or_else(|| IfpError::DomainNotFound(domain.clone()))?;
    let uid: u32 = parts[1]
        .parse()
        .map_err(|_| IfpError::InvalidArgument(format!("not a valid uid: {}", parts[1])))?;
    Ok((domain, uid))
}

fn users_interface() -> sbus::Interface {
    InterfaceBuilder::new(USERS_IFACE)
        .method("FindByName", |ctx: Context, data: InstanceData| async move {
            let state = state_of(&data);
            match find_by_name(&state, &ctx).await {
                Ok(path) => ctx.finish((path,)),
                Err(err) => ctx.fail_and_finish(err.into()),
            }
        })
        .method("FindByID", |ctx: Context, data: InstanceData| async move {
            let state = state_of(&data);
            match find_by_id(&state, &ctx).await {
                Ok(path) => ctx.finish((path,)),
                Err(err) => ctx.fail_and_finish(err.into()),
            }
        })
        .method("ListByName", |ctx: Context, _data: InstanceData| async move {
            // Stub per spec.md section 9 Open Question: returns success with
            // no data; bulk listing is unspecified, not invented here.
            let empty: Vec<String> = Vec::new();
            ctx.finish((empty,))
        })
        .method(
            "ListByDomainAndName",
            |ctx: Context, _data: InstanceData| async move {
                let empty: Vec<String> = Vec::new();
                ctx.finish((empty,))
            },
        )
        .build()
}

async fn find_by_name(state: &UsersState, ctx: &Context) -> Result<String, IfpError> {
    let name: String = ctx
        .message()
        .read1()
        .map_err(|_| IfpError::InvalidArgument("FindByName expects (name)".to_string()))?;
    // `original_source` scans every configured domain in turn for the first
    // match; there is exactly one domain's worth of state threaded through
    // here today, so the natural generalization of that loop is kept but not
    // expanded across multiple domains until `config::Config` exposes more
    // than one.
    let user = state
        .store
        .user_by_name(default_domain(state), &name)
        .await?
        .ok_or(IfpError::NotFound("User"))?;
    build_user_path(&state.users_base, default_domain(state), user.uid)
}

async fn find_by_id(state: &UsersState, ctx: &Context) -> Result<String, IfpError> {
    let uid: u32 = ctx
        .message()
        .read1()
        .map_err(|_| IfpError::InvalidArgument("FindByID expects (uid)".to_string()))?;
    let user = state
        .store
        .user_by_uid(default_domain(state), uid)
        .await?
        .ok_or(IfpError::NotFound("User"))?;
    build_user_path(&state.users_base, default_domain(state), user.uid)
}

/// Only one domain is modeled end to end in this daemon's configuration
/// surface today (see DESIGN.md); `default_domain` names the seam a
/// multi-domain `Config` would replace.
fn default_domain(state: &UsersState) -> &str {
    let _ = state;
    "dom"
}

fn user_interface() -> sbus::Interface {
    InterfaceBuilder::new(USER_IFACE)
        .method(
            "UpdateGroupsList",
            |ctx: Context, data: InstanceData| async move {
                let state = state_of(&data);
                let path = ctx.path().to_string();
                match update_groups_list(&state, &path).await {
                    Ok(()) => ctx.finish(()),
                    Err(err) => ctx.fail_and_finish(err.into()),
                }
            },
        )
        .property("name", |path, data, caller| async move {
            string_property(path, data, caller, "name", |u| u.name.clone()).await
        })
        .property("uidNumber", |path, data, caller| async move {
            u32_property(path, data, caller, "uidNumber", |u| u.uid).await
        })
        .property("gidNumber", |path, data, caller| async move {
            u32_property(path, data, caller, "gidNumber", |u| u.gid).await
        })
        .property("gecos", |path, data, caller| async move {
            string_property(path, data, caller, "gecos", |u| u.gecos.clone()).await
        })
        .property("homeDirectory", |path, data, caller| async move {
            string_property(path, data, caller, "homeDirectory", |u| u.home_directory.clone()).await
        })
        .property("loginShell", |path, data, caller| async move {
            string_property(path, data, caller, "loginShell", |u| u.login_shell.clone()).await
        })
        .property("groups", |path, data, _caller| async move {
            let state = state_of(&data);
            if !is_attribute_allowed(&state.attributes, "groups") {
                let empty: Vec<String> = Vec::new();
                return Ok(Variant(Box::new(empty) as Box<dyn RefArg + Send>));
            }
            let (domain, uid) = decompose_user_path(&path, &state.users_base, &state.domains)?;
            let user = state
                .store
                .user_by_uid(&domain, uid)
                .await
                .map_err(IfpError::from)?
                .ok_or(IfpError::NotFound("User"))?;
            let groups = state.store.initgroups(&domain, &user.name).await.map_err(IfpError::from)?;
            // Ignore gid == 0 (spec.md section 4.F: "ignores entries with
            // gid == 0").
            let paths: Vec<String> = groups
                .into_iter()
                .filter(|g| g.gid != 0)
                .filter_map(|g| compose(&state.groups_base, &[&domain, &g.gid.to_string()]).ok())
                .collect();
            Ok(Variant(Box::new(paths) as Box<dyn RefArg + Send>))
        })
        .property("extraAttributes", |path, data, _caller| async move {
            let state = state_of(&data);
            let (domain, uid) = decompose_user_path(&path, &state.users_base, &state.domains)?;
            let attrs: Vec<String> = state.attributes.allowed.clone();
            let values = state
                .store
                .user_extra_attrs(&domain, uid, &attrs)
                .await
                .map_err(IfpError::from)?;
            let values: HashMap<String, Vec<String>> = values
                .into_iter()
                .filter(|(k, _)| is_attribute_allowed(&state.attributes, k))
                .collect();
            Ok(Variant(Box::new(values) as Box<dyn RefArg + Send>))
        })
        .build()
}

async fn update_groups_list(state: &UsersState, path: &str) -> Result<(), IfpError> {
    let (domain, uid) = decompose_user_path(path, &state.users_base, &state.domains)?;
    let user = state
        .store
        .user_by_uid(&domain, uid)
        .await?
        .ok_or(IfpError::NotFound("User"))?;
    state.store.refresh_groups(&domain, &user.name).await?;
    Ok(())
}

async fn string_property(
    path: dbus::Path<'static>,
    data: InstanceData,
    _caller: Option<CallerId>,
    attr: &'static str,
    project: impl Fn(&crate::identity_store::UserEntry) -> String,
) -> Result<PropertyValue, MethodErr> {
    let state = state_of(&data);
    if !is_attribute_allowed(&state.attributes, attr) {
        return Ok(Variant(Box::new(String::new()) as Box<dyn RefArg + Send>));
    }
    let (domain, uid) = decompose_user_path(&path, &state.users_base, &state.domains)?;
    let user = state
        .store
        .user_by_uid(&domain, uid)
        .await
        .map_err(IfpError::from)?
        .ok_or(IfpError::NotFound("User"))?;
    Ok(Variant(Box::new(project(&user)) as Box<dyn RefArg + Send>))
}

async fn u32_property(
    path: dbus::Path<'static>,
    data: InstanceData,
    _caller: Option<CallerId>,
    attr: &'static str,
    project: impl Fn(&crate::identity_store::UserEntry) -> u32,
) -> Result<PropertyValue, MethodErr> {
    let state = state_of(&data);
    if !is_attribute_allowed(&state.attributes, attr) {
        return Ok(Variant(Box::new(0u32) as Box<dyn RefArg + Send>));
    }
    let (domain, uid) = decompose_user_path(&path, &state.users_base, &state.domains)?;
    let user = state
        .store
        .user_by_uid(&domain, uid)
        .await
        .map_err(IfpError::from)?
        .ok_or(IfpError::NotFound("User"))?;
    Ok(Variant(Box::new(project(&user)) as Box<dyn RefArg + Send>))
}

/// `is_attribute_allowed(ctx, attr)` from spec.md section 4.F. Core
/// attributes are always visible; arbitrary extra attribute keys must be on
/// the configured allow-list. A disallowed property getter returns the
/// empty value rather than an error (spec.md section 9 Open Question,
/// confirmed in DESIGN.md).
pub fn is_attribute_allowed(attributes: &AttributeAllowList, attr: &str) -> bool {
    const CORE: &[&str] = &[
        "name",
        "uidNumber",
        "gidNumber",
        "gecos",
        "homeDirectory",
        "loginShell",
        "groups",
    ];
    CORE.contains(&attr) || attributes.is_allowed(attr)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::identity_store::{GroupEntry, MockIdentityStore, UserEntry};

    fn store_with_alice() -> Arc<MockIdentityStore> {
        let store = Arc::new(MockIdentityStore::new());
        store.add_user(
            "dom",
            UserEntry {
                uid: 1000,
                gid: 1000,
                name: "alice".to_string(),
                gecos: "Alice Example".to_string(),
                home_directory: "/home/alice".to_string(),
                login_shell: "/bin/bash".to_string(),
            },
        );
        store.add_group(
            "dom",
            GroupEntry {
                gid: 1000,
                name: "alice".to_string(),
                members: vec!["alice".to_string()],
            },
        );
        store.add_group(
            "dom",
            GroupEntry {
                gid: 0,
                name: "root".to_string(),
                members: vec!["alice".to_string()],
            },
        );
        store.set_memberships("dom", "alice", vec![1000, 0]);
        store
    }

    #[test]
    fn builds_user_path() {
        let p = build_user_path("/org/example/Users", "dom", 1000).unwrap();
        assert_eq!(p, "/org/example/Users/dom/1000");
    }

    fn dom_list() -> Vec<DomainConfig> {
        vec![DomainConfig { name: "dom".to_string() }]
    }

    #[test]
    fn decomposes_user_path() {
        let (domain, uid) =
            decompose_user_path("/org/example/Users/dom/1000", "/org/example/Users", &dom_list()).unwrap();
        assert_eq!(domain, "dom");
        assert_eq!(uid, 1000);
    }

    #[test]
    fn rejects_malformed_uid() {
        assert!(decompose_user_path("/org/example/Users/dom/notanumber", "/org/example/Users", &dom_list()).is_err());
    }

    #[test]
    fn rejects_unconfigured_domain() {
        let err = decompose_user_path("/org/example/Users/other/1000", "/org/example/Users", &dom_list())
            .unwrap_err();
        assert!(matches!(err, IfpError::DomainNotFound(d) if d == "other"));
    }

    #[tokio::test]
    async fn update_groups_list_fails_for_missing_user() {
        let store = store_with_alice();
        let state = UsersState {
            store,
            users_base: "/org/example/Users".to_string(),
            groups_base: "/org/example/Groups".to_string(),
            attributes: AttributeAllowList::default(),
            domains: dom_list(),
        };
        let err = update_groups_list(&state, "/org/example/Users/dom/9999")
            .await
            .unwrap_err();
        assert!(matches!(err, IfpError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_groups_list_succeeds_for_known_user() {
        let store = store_with_alice();
        let state = UsersState {
            store,
            users_base: "/org/example/Users".to_string(),
            groups_base: "/org/example/Groups".to_string(),
            attributes: AttributeAllowList::default(),
            domains: dom_list(),
        };
        assert!(update_groups_list(&state, "/org/example/Users/dom/1000").await.is_ok());
    }

    #[test]
    fn core_attributes_always_allowed() {
        let attrs = AttributeAllowList::default();
        assert!(is_attribute_allowed(&attrs, "name"));
        assert!(!is_attribute_allowed(&attrs, "phoneNumber"));
    }
}
