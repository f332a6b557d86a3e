use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Voter,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Is this one of the administrator roles?
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
                Self::SuperAdmin => "super_admin",
            }
        )
    }
}

/// A single administrative capability.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    CreateElections,
    EditElections,
    DeleteElections,
    ManageVoters,
    ManageAdmins,
    ViewLogs,
    ChangeSettings,
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CreateElections => "can_create_elections",
            Self::EditElections => "can_edit_elections",
            Self::DeleteElections => "can_delete_elections",
            Self::ManageVoters => "can_manage_voters",
            Self::ManageAdmins => "can_manage_admins",
            Self::ViewLogs => "can_view_logs",
            Self::ChangeSettings => "can_change_settings",
        };
        write!(formatter, "{name}")
    }
}

/// The capability set of an administrator.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Permissions {
    pub can_create_elections: bool,
    pub can_edit_elections: bool,
    pub can_delete_elections: bool,
    pub can_manage_voters: bool,
    pub can_manage_admins: bool,
    pub can_view_logs: bool,
    pub can_change_settings: bool,
}

impl Permissions {
    /// The default capabilities granted to a freshly created user of the given role.
    /// Voters have none.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Voter => Self::default(),
            Role::Admin => Self {
                can_create_elections: true,
                can_edit_elections: true,
                can_delete_elections: false,
                can_manage_voters: true,
                can_manage_admins: false,
                can_view_logs: true,
                can_change_settings: false,
            },
            Role::SuperAdmin => Self {
                can_create_elections: true,
                can_edit_elections: true,
                can_delete_elections: true,
                can_manage_voters: true,
                can_manage_admins: true,
                can_view_logs: true,
                can_change_settings: true,
            },
        }
    }

    /// Does this set include the given capability?
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::CreateElections => self.can_create_elections,
            Permission::EditElections => self.can_edit_elections,
            Permission::DeleteElections => self.can_delete_elections,
            Permission::ManageVoters => self.can_manage_voters,
            Permission::ManageAdmins => self.can_manage_admins,
            Permission::ViewLogs => self.can_view_logs,
            Permission::ChangeSettings => self.can_change_settings,
        }
    }
}
