//! The groups façade (SPEC_FULL.md Module G) — a direct analogy of the
//! users façade (spec.md section 4.F), needed because the users façade's
//! `groups` property builds object paths into this namespace
//! (`/Groups/<domain>/<gid>`, spec.md section 6) and nothing can answer a
//! call on those paths without it. Same path scheme, same
//! decompose-then-lookup shape, same error names as [`super::users`].

use crate::config::DomainConfig;
use crate::domains::find_domain;
use crate::error::IfpError;
use crate::identity_store::IdentityStore;
use dbus::arg::{RefArg, Variant};
use sbus::context::{CallerId, Context};
use sbus::iface::{InstanceData, PropertyValue};
use sbus::path::{compose, decompose_exact};
use sbus::{Connection, InterfaceBuilder, MethodErr};
use std::sync::Arc;

pub const GROUPS_IFACE: &str = "org.freedesktop.identity.Groups";
pub const GROUP_IFACE: &str = "org.freedesktop.identity.Group";

pub struct GroupsState {
    pub store: Arc<dyn IdentityStore>,
    pub groups_base: String,
    pub domains: Vec<DomainConfig>,
}

pub fn register<T: sbus::connection::Transport + 'static>(
    conn: &Connection<T>,
    state: Arc<GroupsState>,
) -> Result<(), sbus::RegistryError> {
    let groups_base = state.groups_base.clone();
    let subtree = format!("{}/*", groups_base);
    conn.register_interface(&groups_base, groups_interface(), state.clone())?;
    conn.register_interface(&subtree, group_interface(), state)?;
    Ok(())
}

fn state_of(data: &InstanceData) -> Arc<GroupsState> {
    data.clone()
        .downcast::<GroupsState>()
        .expect("Groups/Group interfaces are always registered with GroupsState instance data")
}

fn build_group_path(base: &str, domain: &str, gid: u32) -> Result<String, IfpError> {
    compose(base, &[domain, &gid.to_string()]).map_err(|e| IfpError::Internal(e.message().to_string()))
}

fn decompose_group_path(path: &str, base: &str, domains: &[DomainConfig]) -> Result<(String, u32), IfpError> {
    let parts = decompose_exact(path, base, 2)
        .map_err(|e| IfpError::InvalidArgument(e.message().to_string()))?;
    let domain = parts[0].clone();
    find_domain(domains, &domain).ok_or_else(|| IfpError::DomainNotFound(domain.clone()))?;
    let gid: u32 = parts[1]
        .parse()
        .map_err(|_| IfpError::InvalidArgument(format!("not a valid gid: {}", parts[1])))?;
    Ok((domain, gid))
}

fn default_domain() -> &'static str {
    "dom"
}

fn groups_interface() -> sbus::Interface {
    InterfaceBuilder::new(GROUPS_IFACE)
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
        .build()
}

async fn find_by_name(state: &GroupsState, ctx: &Context) -> Result<String, IfpError> {
    let name: String = ctx
        .message()
        .read1()
        .map_err(|_| IfpError::InvalidArgument("FindByName expects (name)".to_string()))?;
    let group = state
        .store
        .group_by_name(default_domain(), &name)
        .await?
        .ok_or(IfpError::NotFound("Group"))?;
    build_group_path(&state.groups_base, default_domain(), group.gid)
}

async fn find_by_id(state: &GroupsState, ctx: &Context) -> Result<String, IfpError> {
    let gid: u32 = ctx
        .message()
        .read1()
        .map_err(|_| IfpError::InvalidArgument("FindByID expects (gid)".to_string()))?;
    let group = state
        .store
        .group_by_gid(default_domain(), gid)
        .await?
        .ok_or(IfpError::NotFound("Group"))?;
    build_group_path(&state.groups_base, default_domain(), group.gid)
}

fn group_interface() -> sbus::Interface {
    InterfaceBuilder::new(GROUP_IFACE)
        .property("name", |path, data, caller| async move {
            name_property(path, data, caller).await
        })
        .property("gidNumber", |path, data, caller| async move {
            gid_property(path, data, caller).await
        })
        .property("users", |path, data, _caller| async move {
            let state = state_of(&data);
            let (domain, gid) = decompose_group_path(&path, &state.groups_base, &state.domains)?;
            let group = state
                .store
                .group_by_gid(&domain, gid)
                .await
                .map_err(IfpError::from)?
                .ok_or(IfpError::NotFound("Group"))?;
            Ok(Variant(Box::new(group.members) as Box<dyn RefArg + Send>))
        })
        .build()
}

async fn name_property(
    path: dbus::Path<'static>,
    data: InstanceData,
    _caller: Option<CallerId>,
) -> Result<PropertyValue, MethodErr> {
    let state = state_of(&data);
    let (domain, gid) = decompose_group_path(&path, &state.groups_base, &state.domains)?;
    let group = state
        .store
        .group_by_gid(&domain, gid)
        .await
        .map_err(IfpError::from)?
        .ok_or(IfpError::NotFound("Group"))?;
    Ok(Variant(Box::new(group.name) as Box<dyn RefArg + Send>))
}

async fn gid_property(
    path: dbus::Path<'static>,
    data: InstanceData,
    _caller: Option<CallerId>,
) -> Result<PropertyValue, MethodErr> {
    let state = state_of(&data);
    let (domain, gid) = decompose_group_path(&path, &state.groups_base, &state.domains)?;
    let group = state
        .store
        .group_by_gid(&domain, gid)
        .await
        .map_err(IfpError::from)?
        .ok_or(IfpError::NotFound("Group"))?;
    Ok(Variant(Box::new(group.gid) as Box<dyn RefArg + Send>))
}
