//! `portal community ...`

use anyhow::Result;
use community::model::slugify;
use community::{Community, CreateCommunity};
use portal_core::{ListParams, ServiceError};

use super::{Context, or_dash};

/// Flags of `portal community create`.
pub struct CreateArgs {
    pub name: String,
    pub slug: Option<String>,
    pub admin: String,
    pub order: i64,
    pub parent: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

pub fn create(ctx: &Context, args: CreateArgs) -> Result<()> {
    let admin = ctx
        .auth
        .get_systers_user_by_username(&args.admin)
        .map_err(ServiceError::from)?;
    let parent = match &args.parent {
        Some(slug) => Some(
            ctx.communities
                .get_community_by_slug(slug)
                .map_err(ServiceError::from)?
                .id,
        ),
        None => None,
    };
    let slug = args.slug.unwrap_or_else(|| slugify(&args.name));

    let community = ctx
        .communities
        .create_community(CreateCommunity {
            name: args.name,
            slug,
            order: args.order,
            community_admin: admin.id,
            parent_community: parent,
            email: args.email,
            website: args.website,
            ..Default::default()
        })
        .map_err(ServiceError::from)?;

    if ctx.json {
        return ctx.print_json(&community);
    }
    println!("Community \"{}\" created ({}).", community.name, community.slug);
    Ok(())
}

pub fn show(ctx: &Context, slug: &str) -> Result<()> {
    let community = lookup(ctx, slug)?;
    let admin = ctx
        .auth
        .systers_user_username(&community.community_admin)
        .map_err(ServiceError::from)?;
    let members = ctx
        .communities
        .list_members(&community.id)
        .map_err(ServiceError::from)?;

    if ctx.json {
        return ctx.print_json(&serde_json::json!({
            "community": community,
            "admin": admin,
            "members": members,
        }));
    }

    println!("Name:         {}", community.name);
    println!("Slug:         {}", community.slug);
    println!("Order:        {}", community.order);
    println!("Admin:        {}", admin);
    println!("Parent:       {}", or_dash(community.parent_community.as_deref()));
    println!("Email:        {}", or_dash(community.email.as_deref()));
    println!("Mailing list: {}", or_dash(community.mailing_list.as_deref()));
    println!("Website:      {}", or_dash(community.website.as_deref()));
    println!("Members:      {}", members.len());
    println!("Created:      {}", community.created_at);
    println!("Updated:      {}", community.updated_at);
    Ok(())
}

pub fn rename(ctx: &Context, slug: &str, name: &str) -> Result<()> {
    let mut community = lookup(ctx, slug)?;
    community.name = name.to_string();
    ctx.communities
        .save_community(&mut community)
        .map_err(ServiceError::from)?;

    if ctx.json {
        return ctx.print_json(&community);
    }
    println!(
        "Community \"{}\" renamed to \"{}\".",
        community.original_name, community.name
    );
    Ok(())
}

pub fn transfer(ctx: &Context, slug: &str, username: &str) -> Result<()> {
    let admin = ctx
        .auth
        .get_systers_user_by_username(username)
        .map_err(ServiceError::from)?;
    let mut community = lookup(ctx, slug)?;
    community.community_admin = admin.id;
    ctx.communities
        .save_community(&mut community)
        .map_err(ServiceError::from)?;

    if ctx.json {
        return ctx.print_json(&community);
    }
    println!("Community \"{}\" is now administered by {}.", community.name, username);
    Ok(())
}

pub fn delete(ctx: &Context, slug: &str) -> Result<()> {
    let community = lookup(ctx, slug)?;
    ctx.communities
        .delete_community(&community.id)
        .map_err(ServiceError::from)?;

    if ctx.json {
        return ctx.print_json(&serde_json::json!({ "deleted": community.slug }));
    }
    println!("Community \"{}\" deleted.", community.name);
    Ok(())
}

pub fn list(ctx: &Context, limit: Option<usize>, offset: Option<usize>) -> Result<()> {
    let defaults = ListParams::default();
    let params = ListParams {
        limit: limit.unwrap_or(defaults.limit),
        offset: offset.unwrap_or(defaults.offset),
    };
    let result = ctx
        .communities
        .list_communities(&params)
        .map_err(ServiceError::from)?;

    if ctx.json {
        return ctx.print_json(&result);
    }
    if result.items.is_empty() {
        println!("No communities.");
        return Ok(());
    }

    println!("{:6} {:24} {:30}", "ORDER", "SLUG", "NAME");
    for c in &result.items {
        println!("{:6} {:24} {:30}", c.order, c.slug, c.name);
    }
    println!("({} of {})", result.items.len(), result.total);
    Ok(())
}

fn lookup(ctx: &Context, slug: &str) -> Result<Community> {
    Ok(ctx
        .communities
        .get_community_by_slug(slug)
        .map_err(ServiceError::from)?)
}
