use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Kinds of administrative action recorded in the audit log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Login,
    Logout,
    CreateElection,
    UpdateElection,
    ReactivateElection,
    DeleteElection,
    AddCandidate,
    UpdateCandidate,
    DeleteCandidate,
    GenerateCodes,
    RegenerateCode,
    ToggleShared,
    DeleteVoter,
    ExportVoters,
    CreateAdmin,
    UpdateAdmin,
    ChangePassword,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Same spelling as the stored form.
        let name = match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::CreateElection => "CREATE_ELECTION",
            Self::UpdateElection => "UPDATE_ELECTION",
            Self::ReactivateElection => "REACTIVATE_ELECTION",
            Self::DeleteElection => "DELETE_ELECTION",
            Self::AddCandidate => "ADD_CANDIDATE",
            Self::UpdateCandidate => "UPDATE_CANDIDATE",
            Self::DeleteCandidate => "DELETE_CANDIDATE",
            Self::GenerateCodes => "GENERATE_CODES",
            Self::RegenerateCode => "REGENERATE_CODE",
            Self::ToggleShared => "TOGGLE_SHARED",
            Self::DeleteVoter => "DELETE_VOTER",
            Self::ExportVoters => "EXPORT_VOTERS",
            Self::CreateAdmin => "CREATE_ADMIN",
            Self::UpdateAdmin => "UPDATE_ADMIN",
            Self::ChangePassword => "CHANGE_PASSWORD",
        };
        f.write_str(name)
    }
}
