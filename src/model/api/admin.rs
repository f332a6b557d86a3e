use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::role::{Permissions, Role},
    db::admin::{Admin, NewAdmin},
};

use super::id::ApiId;

pub const MIN_PASSWORD_LENGTH: usize = 8;

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// A new administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSpec {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

impl TryFrom<AdminSpec> for NewAdmin {
    type Error = Error;

    fn try_from(spec: AdminSpec) -> Result<Self> {
        let email = spec.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(Error::bad_request("Invalid email address"));
        }
        if spec.name.trim().is_empty() {
            return Err(Error::bad_request("Admin name must not be empty"));
        }
        if !spec.role.is_admin() {
            return Err(Error::bad_request(format!("Not an admin role: {}", spec.role)));
        }
        check_password(&spec.password)?;
        NewAdmin::new(email, spec.name.trim().to_string(), &spec.password, spec.role)
    }
}

/// An administrator, without any credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDescription {
    pub id: ApiId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

impl From<Admin> for AdminDescription {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id.into(),
            email: admin.admin.email,
            name: admin.admin.name,
            role: admin.admin.role,
            permissions: admin.admin.permissions,
            created_at: admin.admin.created_at,
        }
    }
}

/// A change of role and/or permissions. A role change without explicit
/// permissions resets them to the role's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUpdate {
    pub role: Option<Role>,
    pub permissions: Option<Permissions>,
}

impl AdminUpdate {
    pub fn validate(self) -> Result<(Option<Role>, Option<Permissions>)> {
        match self.role {
            Some(role) if !role.is_admin() => {
                Err(Error::bad_request(format!("Not an admin role: {role}")))
            }
            Some(role) => Ok((
                Some(role),
                Some(self.permissions.unwrap_or_else(|| Permissions::for_role(role))),
            )),
            None => Ok((None, self.permissions)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<()> {
        check_password(&self.new_password)
    }
}
