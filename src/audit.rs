//! The append-only record of administrative actions.

use crate::model::{
    api::auth::AuthToken,
    common::action::Action,
    db::{admin::Admin, log::NewLogEntry},
    store::Store,
};

/// Append an entry for an action the given admin just performed.
///
/// The action has already happened by the time this runs, so a failed
/// write is logged and otherwise ignored.
pub async fn record(
    store: &dyn Store,
    admin: &AuthToken<Admin>,
    action: Action,
    details: impl Into<String>,
) {
    let entry = NewLogEntry::new(admin.id, admin.name.clone(), action, details.into());
    if let Err(e) = store.append_log(entry).await {
        warn!("Failed to write audit log entry {action} for admin {}: {e}", admin.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{
        db::admin::{Admin, NewAdmin},
        mongodb::Id,
        store::MemoryStore,
    };

    fn token() -> AuthToken<Admin> {
        AuthToken::new(&Admin {
            id: Id::new(),
            admin: NewAdmin::example(),
        })
    }

    #[rocket::async_test]
    async fn entries_carry_admin_identity() {
        let store = MemoryStore::new();
        let admin = token();
        record(&store, &admin, Action::CreateElection, "Created 'Council'").await;

        let logs = store.logs(0, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].admin_id, admin.id);
        assert_eq!(logs[0].admin_name, "Admin User");
        assert_eq!(logs[0].action, Action::CreateElection);
    }

    #[rocket::async_test]
    async fn write_failures_are_swallowed() {
        log4rs_test_utils::test_logging::init_logging_once_for(["votecode_backend"], None, None);

        let store = MemoryStore::new();
        store.fail_log_writes();
        record(&store, &token(), Action::Logout, "").await;
        assert_eq!(store.count_logs().await.unwrap(), 0);
    }
}
