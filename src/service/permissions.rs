use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{CurrentUser, Role};

/// Functional area a permission applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Deliveries,
    Orders,
    Reconciliation,
    Suppliers,
    Groups,
    Dlc,
    Tasks,
    Publicities,
    CustomerOrders,
    Administration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Validate,
}

use Action::*;

/// Role × module matrix
fn allowed(role: Role, module: Module) -> &'static [Action] {
    const ALL: &[Action] = &[View, Create, Edit, Delete, Validate];
    const NONE: &[Action] = &[];
    match (role, module) {
        (Role::Admin, _) => ALL,
        (Role::Directeur, Module::Administration | Module::Groups) => &[View],
        (Role::Directeur, _) => ALL,
        (Role::Manager, Module::Reconciliation) => &[View, Edit, Validate],
        (Role::Manager, Module::Suppliers | Module::Groups | Module::Publicities) => &[View],
        (Role::Manager, Module::Administration) => NONE,
        (Role::Manager, _) => &[View, Create, Edit, Delete, Validate],
        (Role::Employee, Module::Reconciliation | Module::Administration) => NONE,
        (Role::Employee, Module::Suppliers | Module::Groups | Module::Publicities) => &[View],
        (Role::Employee, Module::Dlc | Module::Tasks) => &[View, Create, Edit, Validate],
        (Role::Employee, _) => &[View, Create, Edit],
    }
}

pub fn has_permission(user: &CurrentUser, module: Module, action: Action) -> bool {
    allowed(user.role(), module).contains(&action)
}

pub fn require(user: &CurrentUser, module: Module, action: Action) -> AppResult<()> {
    if has_permission(user, module, action) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "{:?} on {:?} is not allowed for role {:?}",
            action, module, user.role()
        )))
    }
}

/// Passes when the user holds at least one of `actions`
pub fn require_any(user: &CurrentUser, module: Module, actions: &[Action]) -> AppResult<()> {
    if actions.iter().any(|a| has_permission(user, module, *a)) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "{:?} on {:?} is not allowed for role {:?}",
            actions, module, user.role()
        )))
    }
}

pub fn require_group(user: &CurrentUser, group_id: i64) -> AppResult<()> {
    if user.can_access_group(group_id) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "store {} is not assigned to this user",
            group_id
        )))
    }
}

pub fn require_admin(user: &CurrentUser) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied("administrators only".to_string()))
    }
}

/// Query parameter carrying the store the client is looking at
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreQuery {
    pub store_id: Option<i64>,
}

/// Stores a request is allowed to read.
///
/// `All` only happens for admins without a selected store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreScope {
    All,
    Groups(Vec<i64>),
}

impl StoreScope {
    pub fn resolve(user: &CurrentUser, requested: Option<i64>) -> AppResult<Self> {
        match requested {
            Some(id) => {
                require_group(user, id)?;
                Ok(Self::Groups(vec![id]))
            }
            None if user.is_admin() => Ok(Self::All),
            None => Ok(Self::Groups(user.group_ids.clone())),
        }
    }

    pub fn contains(&self, group_id: i64) -> bool {
        match self {
            Self::All => true,
            Self::Groups(ids) => ids.contains(&group_id),
        }
    }

    /// `None` means unrestricted, for `($1::bigint[] IS NULL OR group_id = ANY($1))`
    pub fn as_filter(&self) -> Option<Vec<i64>> {
        match self {
            Self::All => None,
            Self::Groups(ids) => Some(ids.clone()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::User;
    use chrono::Utc;

    pub fn user(id: i64, role: Role, group_ids: &[i64]) -> CurrentUser {
        CurrentUser {
            user: User {
                id,
                username: format!("user{}", id),
                name: format!("User {}", id),
                email: None,
                role,
                created_at: Utc::now(),
            },
            group_ids: group_ids.to_vec(),
        }
    }
}
