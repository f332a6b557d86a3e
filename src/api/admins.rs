use rocket::{serde::json::Json, Route};

use crate::{
    audit,
    error::{Error, Result},
    model::{
        api::{
            admin::{AdminDescription, AdminSpec, AdminUpdate, PasswordChange},
            auth::AuthToken,
        },
        common::{action::Action, role::Permission},
        db::admin::{hash_password, Admin, NewAdmin},
        mongodb::Id,
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_admins, create_admin, update_admin, change_password]
}

#[get("/admins")]
async fn get_admins(
    token: AuthToken<Admin>,
    store: &dyn Store,
) -> Result<Json<Vec<AdminDescription>>> {
    token.require(Permission::ManageAdmins)?;
    let admins = store.admins().await?;
    Ok(Json(admins.into_iter().map(Into::into).collect()))
}

#[post("/admins", data = "<spec>", format = "json")]
async fn create_admin(
    token: AuthToken<Admin>,
    spec: Json<AdminSpec>,
    store: &dyn Store,
) -> Result<Json<AdminDescription>> {
    token.require(Permission::ManageAdmins)?;
    let admin = NewAdmin::try_from(spec.into_inner())?;

    let admin = match store.insert_admin(admin).await {
        Err(Error::Duplicate(_)) => {
            return Err(Error::conflict("An admin with that email already exists"))
        }
        result => result?,
    };

    audit::record(
        store,
        &token,
        Action::CreateAdmin,
        format!("Created {} '{}' ({})", admin.role, admin.email, admin.id),
    )
    .await;
    Ok(Json(admin.into()))
}

#[put("/admins/<id>", data = "<update>", format = "json")]
async fn update_admin(
    token: AuthToken<Admin>,
    id: Id,
    update: Json<AdminUpdate>,
    store: &dyn Store,
) -> Result<Json<AdminDescription>> {
    token.require(Permission::ManageAdmins)?;
    if id == token.id {
        return Err(Error::bad_request("Cannot change your own role or permissions"));
    }
    let (role, permissions) = update.into_inner().validate()?;

    let admin = store
        .update_admin(id, role, permissions)
        .await?
        .ok_or_else(|| Error::not_found(format!("Admin {id}")))?;

    audit::record(
        store,
        &token,
        Action::UpdateAdmin,
        format!("Updated '{}' to {} {:?}", admin.email, admin.role, admin.permissions),
    )
    .await;
    Ok(Json(admin.into()))
}

#[put("/admins/me/password", data = "<change>", format = "json")]
async fn change_password(
    token: AuthToken<Admin>,
    change: Json<PasswordChange>,
    store: &dyn Store,
) -> Result<()> {
    token.require(Permission::ChangeSettings)?;
    change.validate()?;

    let admin = store
        .admin(token.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Admin {}", token.id)))?;
    if !admin.verify_password(&change.current_password) {
        return Err(Error::forbidden("Current password is incorrect"));
    }

    let hash = hash_password(&change.new_password)?;
    if !store.set_admin_password(admin.id, hash).await? {
        return Err(Error::not_found(format!("Admin {}", admin.id)));
    }

    audit::record(store, &token, Action::ChangePassword, "Changed own password").await;
    Ok(())
}
