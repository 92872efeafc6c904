//! `portal user ...`

use anyhow::Result;
use auth::model::CreateUser;
use portal_core::ServiceError;

use super::{Context, or_dash};

/// Create a user; the matching portal profile is created with it.
pub fn create(ctx: &Context, username: &str, password: &str, email: Option<String>) -> Result<()> {
    let user = ctx
        .auth
        .create_user(CreateUser {
            username: username.to_string(),
            password: password.to_string(),
            email,
        })
        .map_err(ServiceError::from)?;
    let profile = ctx
        .auth
        .get_systers_user_by_user(&user.id)
        .map_err(ServiceError::from)?;

    if ctx.json {
        ctx.print_json(&serde_json::json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "systers_user": profile,
        }))?;
    } else {
        println!("User \"{}\" created (profile {}).", user.username, profile.id);
    }
    Ok(())
}

/// List portal profiles with their usernames.
pub fn list(ctx: &Context) -> Result<()> {
    let profiles = ctx.auth.list_systers_users().map_err(ServiceError::from)?;

    let mut rows = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let username = ctx
            .auth
            .systers_user_username(&profile.id)
            .map_err(ServiceError::from)?;
        rows.push((username, profile));
    }

    if ctx.json {
        let items: Vec<_> = rows
            .iter()
            .map(|(username, p)| serde_json::json!({ "username": username, "systers_user": p }))
            .collect();
        return ctx.print_json(&items);
    }

    println!("{:20} {:34} {:20}", "USERNAME", "PROFILE", "COUNTRY");
    for (username, p) in &rows {
        println!("{:20} {:34} {:20}", username, p.id, or_dash(p.country.as_deref()));
    }
    Ok(())
}

/// Delete a user. Communities they administer are deleted first.
pub fn delete(ctx: &Context, username: &str) -> Result<()> {
    let user = ctx
        .auth
        .get_user_by_username(username)
        .map_err(ServiceError::from)?;
    let removed = ctx
        .communities
        .delete_user(&user.id)
        .map_err(ServiceError::from)?;

    if ctx.json {
        let slugs: Vec<_> = removed.iter().map(|c| c.slug.as_str()).collect();
        return ctx.print_json(&serde_json::json!({
            "deleted": user.username,
            "communities": slugs,
        }));
    }
    println!("User \"{}\" deleted.", user.username);
    for c in &removed {
        println!("  community \"{}\" deleted", c.name);
    }
    Ok(())
}
