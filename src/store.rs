//! Users, roles and permissions.
//!
//! The whole store is one [`StoreData`] value behind a lock. Every mutation
//! rewrites the snapshot file (when the store has one) before returning, so
//! the file always matches what callers have been told.

use crate::auth::hash_password;
use crate::error::StoreError;
use crate::saving::{load_snapshot, save_snapshot};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_ROLE: &str = "user";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@dashboard.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Permission names checked by the HTTP layer
pub mod perm {
    pub const VIEW_DASHBOARD: &str = "view_dashboard";
    pub const MANAGE_USERS: &str = "manage_users";
    pub const CREATE_USERS: &str = "create_users";
    pub const EDIT_USERS: &str = "edit_users";
    pub const DELETE_USERS: &str = "delete_users";
    pub const VIEW_USERS: &str = "view_users";
    pub const MANAGE_ROLES: &str = "manage_roles";
    pub const VIEW_ANALYTICS: &str = "view_analytics";
    pub const EXPORT_DATA: &str = "export_data";
}

/// `(name, description, resource, action)` for every seeded permission
const SEED_PERMISSIONS: [(&str, &str, &str, &str); 9] = [
    (perm::VIEW_DASHBOARD, "View the dashboard", "dashboard", "read"),
    (perm::MANAGE_USERS, "Manage users", "users", "manage"),
    (perm::CREATE_USERS, "Create users", "users", "create"),
    (perm::EDIT_USERS, "Edit users", "users", "update"),
    (perm::DELETE_USERS, "Delete users", "users", "delete"),
    (perm::VIEW_USERS, "View users", "users", "read"),
    (perm::MANAGE_ROLES, "Manage roles and permissions", "roles", "manage"),
    (perm::VIEW_ANALYTICS, "View advanced analytics", "analytics", "read"),
    (perm::EXPORT_DATA, "Export data", "data", "export"),
];

const MANAGER_PERMISSIONS: [&str; 4] = [
    perm::VIEW_DASHBOARD,
    perm::VIEW_USERS,
    perm::VIEW_ANALYTICS,
    perm::EXPORT_DATA,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

/// Permission as shown inside a user or login payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionInfo {
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
}

impl From<&Permission> for PermissionInfo {
    fn from(p: &Permission) -> Self {
        PermissionInfo {
            name: p.name.clone(),
            description: p.description.clone(),
            resource: p.resource.clone(),
            action: p.action.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

/// Stored user, including the password hash. Never serialized to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User joined with its role, as listed to clients
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub role_id: i64,
    pub role_name: String,
    pub role_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserSummary,
    pub permissions: Vec<PermissionInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub role_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRole {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub permissions: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<i64>>,
}

/// Serialized contents of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub users: Vec<User>,
    /// `(role_id, permission_id)` pairs
    pub role_permissions: Vec<(i64, i64)>,
    next_role_id: i64,
    next_permission_id: i64,
    next_user_id: i64,
}

impl StoreData {
    fn role(&self, id: i64) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_mut(&mut self, id: i64) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn permissions_of(&self, role_id: i64) -> Vec<&Permission> {
        let mut perms: Vec<&Permission> = self
            .permissions
            .iter()
            .filter(|p| self.role_permissions.contains(&(role_id, p.id)))
            .collect();
        perms.sort_by(|a, b| a.name.cmp(&b.name));
        perms
    }

    fn summary(&self, user: &User) -> UserSummary {
        let role = self.role(user.role_id);
        UserSummary {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
            role_id: user.role_id,
            role_name: role.map(|r| r.name.clone()).unwrap_or_default(),
            role_description: role.and_then(|r| r.description.clone()),
        }
    }

    fn add_role(&mut self, name: &str, description: Option<String>) -> i64 {
        self.next_role_id += 1;
        let id = self.next_role_id;
        self.roles.push(Role {
            id,
            name: name.to_string(),
            description,
            created_at: Utc::now(),
        });
        id
    }

    fn replace_role_permissions(&mut self, role_id: i64, permission_ids: &[i64]) -> Result<(), StoreError> {
        if let Some(unknown) = permission_ids
            .iter()
            .find(|&&pid| !self.permissions.iter().any(|p| p.id == pid))
        {
            return Err(StoreError::Invalid(format!("Unknown permission id {}", unknown)));
        }
        self.role_permissions.retain(|&(rid, _)| rid != role_id);
        for &pid in permission_ids {
            if !self.role_permissions.contains(&(role_id, pid)) {
                self.role_permissions.push((role_id, pid));
            }
        }
        Ok(())
    }

    /// Default roles, permissions and the admin account
    fn seeded() -> Result<Self, StoreError> {
        let mut data = StoreData::default();
        let now = Utc::now();

        let admin = data.add_role("admin", Some("Administrator with full access".to_string()));
        let manager = data.add_role(
            "manager",
            Some("Manager with access to reports and users".to_string()),
        );
        let user = data.add_role(DEFAULT_ROLE, Some("Standard user with dashboard access".to_string()));

        for (name, description, resource, action) in SEED_PERMISSIONS {
            data.next_permission_id += 1;
            data.permissions.push(Permission {
                id: data.next_permission_id,
                name: name.to_string(),
                description: description.to_string(),
                resource: resource.to_string(),
                action: action.to_string(),
                created_at: now,
            });
        }

        let ids_for = |names: &[&str], data: &StoreData| -> Vec<i64> {
            data.permissions
                .iter()
                .filter(|p| names.contains(&p.name.as_str()))
                .map(|p| p.id)
                .collect()
        };
        let all: Vec<i64> = data.permissions.iter().map(|p| p.id).collect();
        let manager_ids = ids_for(&MANAGER_PERMISSIONS, &data);
        let user_ids = ids_for(&[perm::VIEW_DASHBOARD], &data);
        data.replace_role_permissions(admin, &all)?;
        data.replace_role_permissions(manager, &manager_ids)?;
        data.replace_role_permissions(user, &user_ids)?;

        data.next_user_id += 1;
        data.users.push(User {
            id: data.next_user_id,
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            password_hash: hash_password(DEFAULT_ADMIN_PASSWORD)?,
            name: "Administrator".to_string(),
            role_id: admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        });

        Ok(data)
    }
}

/// Users / roles / permissions store, optionally backed by a snapshot file
#[derive(Debug)]
pub struct Store {
    data: RwLock<StoreData>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open the snapshot at `path`, seeding a new one if it does not exist.
    ///
    /// # Arguments
    /// * `path` - Snapshot file, or `None` to keep everything in memory
    ///
    /// # Returns
    /// * `Result<Store, StoreError>` - The opened store or a load/seed error
    pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
        let Some(path) = path else {
            return Self::in_memory();
        };

        if path.exists() {
            let data: StoreData = load_snapshot(path)?;
            info!(
                "Loaded store from {} ({} users, {} roles)",
                path.display(),
                data.users.len(),
                data.roles.len()
            );
            return Ok(Store {
                data: RwLock::new(data),
                path: Some(path.to_path_buf()),
            });
        }

        let store = Store {
            data: RwLock::new(StoreData::seeded()?),
            path: Some(path.to_path_buf()),
        };
        store.flush()?;
        warn!(
            "Created new store at {} with default admin {}",
            path.display(),
            DEFAULT_ADMIN_EMAIL
        );
        Ok(store)
    }

    /// Seeded store with no backing file
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Store {
            data: RwLock::new(StoreData::seeded()?),
            path: None,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `change` to a copy of the data and publish the copy only once
    /// it has been saved. A failed change or save leaves the store untouched.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StoreData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self.write();
        let mut next = data.clone();
        let out = change(&mut next)?;
        self.persist(&next)?;
        *data = next;
        Ok(out)
    }

    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            save_snapshot(data, path)?;
        }
        Ok(())
    }

    /// Write the current state to the snapshot file, if any
    pub fn flush(&self) -> Result<(), StoreError> {
        let data = self.read();
        self.persist(&data)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.read()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
    }

    pub fn user_by_id(&self, id: i64) -> Option<User> {
        self.read().user(id).cloned()
    }

    pub fn role_name(&self, role_id: i64) -> Option<String> {
        self.read().role(role_id).map(|r| r.name.clone())
    }

    /// All users with their role, newest first
    pub fn list_users(&self) -> Vec<UserSummary> {
        let data = self.read();
        let mut users: Vec<UserSummary> = data.users.iter().map(|u| data.summary(u)).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        users
    }

    pub fn user_detail(&self, id: i64) -> Result<UserDetail, StoreError> {
        let data = self.read();
        let user = data
            .user(id)
            .ok_or_else(|| StoreError::NotFound("User not found".to_string()))?;
        Ok(UserDetail {
            user: data.summary(user),
            permissions: data
                .permissions_of(user.role_id)
                .into_iter()
                .map(PermissionInfo::from)
                .collect(),
        })
    }

    pub fn permissions_for_role(&self, role_id: i64) -> Vec<PermissionInfo> {
        self.read()
            .permissions_of(role_id)
            .into_iter()
            .map(PermissionInfo::from)
            .collect()
    }

    pub fn permission_names_for_role(&self, role_id: i64) -> Vec<String> {
        self.read()
            .permissions_of(role_id)
            .into_iter()
            .map(|p| p.name.clone())
            .collect()
    }

    /// Create a user; without a role it gets the default `user` role.
    pub fn create_user(&self, new: NewUser) -> Result<UserSummary, StoreError> {
        let email = new.email.trim().to_string();
        let name = new.name.trim().to_string();
        if email.is_empty() || new.password.is_empty() || name.is_empty() {
            return Err(StoreError::Invalid(
                "Email, password and name are required".to_string(),
            ));
        }

        let password_hash = hash_password(&new.password)?;

        self.mutate(|data| {
            if data.email_taken(&email, None) {
                return Err(StoreError::Conflict("Email already registered".to_string()));
            }
            let role_id = match new.role_id {
                Some(id) => data
                    .role(id)
                    .map(|r| r.id)
                    .ok_or_else(|| StoreError::Invalid("Role not found".to_string()))?,
                None => data
                    .role_by_name(DEFAULT_ROLE)
                    .map(|r| r.id)
                    .ok_or_else(|| StoreError::Invalid("Default role is missing".to_string()))?,
            };

            let now = Utc::now();
            data.next_user_id += 1;
            let user = User {
                id: data.next_user_id,
                email,
                password_hash,
                name,
                role_id,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            let summary = data.summary(&user);
            data.users.push(user);
            Ok(summary)
        })
    }

    pub fn update_user(&self, id: i64, update: UserUpdate) -> Result<UserSummary, StoreError> {
        self.mutate(|data| {
            if let Some(email) = &update.email {
                if email.trim().is_empty() {
                    return Err(StoreError::Invalid("Email cannot be empty".to_string()));
                }
                if data.email_taken(email.trim(), Some(id)) {
                    return Err(StoreError::Conflict("Email already in use".to_string()));
                }
            }
            if let Some(role_id) = update.role_id {
                if data.role(role_id).is_none() {
                    return Err(StoreError::Invalid("Role not found".to_string()));
                }
            }

            let user = data
                .user_mut(id)
                .ok_or_else(|| StoreError::NotFound("User not found".to_string()))?;
            if let Some(email) = update.email {
                user.email = email.trim().to_string();
            }
            if let Some(name) = update.name {
                user.name = name.trim().to_string();
            }
            if let Some(role_id) = update.role_id {
                user.role_id = role_id;
            }
            if let Some(active) = update.is_active {
                user.is_active = active;
            }
            user.updated_at = Utc::now();
            let user = user.clone();

            Ok(data.summary(&user))
        })
    }

    pub fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        self.mutate(|data| {
            let before = data.users.len();
            data.users.retain(|u| u.id != id);
            if data.users.len() == before {
                return Err(StoreError::NotFound("User not found".to_string()));
            }
            Ok(())
        })
    }

    /// Replace a user's password hash
    pub fn set_password(&self, id: i64, password: &str) -> Result<(), StoreError> {
        if password.is_empty() {
            return Err(StoreError::Invalid("New password is required".to_string()));
        }
        let password_hash = hash_password(password)?;

        self.mutate(|data| {
            let user = data
                .user_mut(id)
                .ok_or_else(|| StoreError::NotFound("User not found".to_string()))?;
            user.password_hash = password_hash;
            user.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Roles ordered by name
    pub fn list_roles(&self) -> Vec<Role> {
        let mut roles = self.read().roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    pub fn role_detail(&self, id: i64) -> Result<RoleDetail, StoreError> {
        let data = self.read();
        let role = data
            .role(id)
            .ok_or_else(|| StoreError::NotFound("Role not found".to_string()))?;
        Ok(RoleDetail {
            role: role.clone(),
            permissions: data.permissions_of(id).into_iter().cloned().collect(),
        })
    }

    pub fn create_role(&self, new: NewRole) -> Result<Role, StoreError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::Invalid("Name is required".to_string()));
        }

        self.mutate(|data| {
            if data.role_by_name(&name).is_some() {
                return Err(StoreError::Conflict("A role with this name already exists".to_string()));
            }
            let id = data.add_role(&name, new.description.filter(|d| !d.is_empty()));
            if let Some(permissions) = new.permissions {
                data.replace_role_permissions(id, &permissions)?;
            }
            data.role(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound("Role not found".to_string()))
        })
    }

    pub fn update_role(&self, id: i64, update: RoleUpdate) -> Result<(), StoreError> {
        self.mutate(|data| {
            if data.role(id).is_none() {
                return Err(StoreError::NotFound("Role not found".to_string()));
            }
            if let Some(name) = &update.name {
                let name = name.trim();
                if name.is_empty() {
                    return Err(StoreError::Invalid("Name cannot be empty".to_string()));
                }
                if data.roles.iter().any(|r| r.name == name && r.id != id) {
                    return Err(StoreError::Conflict("A role with this name already exists".to_string()));
                }
            }
            if let Some(permissions) = &update.permissions {
                data.replace_role_permissions(id, permissions)?;
            }
            if let Some(role) = data.roles.iter_mut().find(|r| r.id == id) {
                if let Some(name) = update.name {
                    role.name = name.trim().to_string();
                }
                if let Some(description) = update.description {
                    role.description = Some(description);
                }
            }
            Ok(())
        })
    }

    /// Delete a role that no user is assigned to
    pub fn delete_role(&self, id: i64) -> Result<(), StoreError> {
        self.mutate(|data| {
            if data.users.iter().any(|u| u.role_id == id) {
                return Err(StoreError::Conflict(
                    "Cannot delete a role that has users assigned".to_string(),
                ));
            }
            let before = data.roles.len();
            data.roles.retain(|r| r.id != id);
            if data.roles.len() == before {
                return Err(StoreError::NotFound("Role not found".to_string()));
            }
            data.role_permissions.retain(|&(rid, _)| rid != id);
            Ok(())
        })
    }

    pub fn set_role_permissions(&self, id: i64, permission_ids: &[i64]) -> Result<(), StoreError> {
        self.mutate(|data| {
            if data.role(id).is_none() {
                return Err(StoreError::NotFound("Role not found".to_string()));
            }
            data.replace_role_permissions(id, permission_ids)
        })
    }

    /// Permissions ordered by resource, then action
    pub fn list_permissions(&self) -> Vec<Permission> {
        let mut permissions = self.read().permissions.clone();
        permissions.sort_by(|a, b| {
            a.resource
                .cmp(&b.resource)
                .then_with(|| a.action.cmp(&b.action))
        });
        permissions
    }
}
