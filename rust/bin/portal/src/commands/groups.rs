//! `portal groups` and `portal perms`.

use anyhow::Result;
use community::permissions::{GROUP_TEMPLATES, group_name};
use community::utils::{community_groups, community_object};
use portal_core::ServiceError;

use super::Context;

/// Groups whose name starts with `name`, with member counts.
pub fn list(ctx: &Context, name: &str) -> Result<()> {
    let groups = community_groups(&ctx.auth, name).map_err(ServiceError::from)?;

    let mut rows = Vec::with_capacity(groups.len());
    for group in groups {
        let members = ctx
            .auth
            .list_group_members(&group.id)
            .map_err(ServiceError::from)?;
        rows.push((group, members.len()));
    }

    if ctx.json {
        let items: Vec<_> = rows
            .iter()
            .map(|(g, n)| serde_json::json!({ "group": g, "members": n }))
            .collect();
        return ctx.print_json(&items);
    }
    if rows.is_empty() {
        println!("No groups start with \"{}\".", name);
        return Ok(());
    }

    println!("{:40} {:8}", "NAME", "MEMBERS");
    for (g, n) in &rows {
        println!("{:40} {:8}", g.name, n);
    }
    Ok(())
}

/// Model-level and object-level codenames of each template group.
pub fn perms(ctx: &Context, slug: &str) -> Result<()> {
    let community = ctx
        .communities
        .get_community_by_slug(slug)
        .map_err(ServiceError::from)?;
    let object = community_object(&community);

    let mut rows = Vec::new();
    for (key, template) in GROUP_TEMPLATES {
        let name = group_name(template, &community.name);
        let Some(group) = ctx.auth.find_group_by_name(&name).map_err(ServiceError::from)? else {
            continue;
        };
        let model_level = ctx
            .auth
            .group_permissions(&group.id)
            .map_err(ServiceError::from)?;
        let object_level = ctx
            .auth
            .get_perms(&group.id, &object)
            .map_err(ServiceError::from)?;
        rows.push((*key, name, model_level, object_level));
    }

    if ctx.json {
        let items: Vec<_> = rows
            .iter()
            .map(|(key, name, model_level, object_level)| {
                serde_json::json!({
                    "template": key,
                    "group": name,
                    "model": model_level,
                    "object": object_level,
                })
            })
            .collect();
        return ctx.print_json(&items);
    }

    for (_, name, model_level, object_level) in &rows {
        println!("{}", name);
        for codename in model_level {
            println!("  {:36} model", codename);
        }
        for codename in object_level {
            println!("  {:36} {}", codename, object);
        }
    }
    Ok(())
}
