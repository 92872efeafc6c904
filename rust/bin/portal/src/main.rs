//! `portal` — administer communities and their permission groups.
//!
//! Usage:
//!   portal [-c <config.toml>] [--data-dir <dir>] <command>
//!
//! Without a config file the database lives in `./portal.sqlite`.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use commands::Context;

/// Community portal administration tool.
#[derive(Parser, Debug)]
#[command(name = "portal", about = "Community portal administration")]
struct Cli {
    /// Path to config file (TOML with a [storage] table).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file).
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// User accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Communities.
    Community {
        #[command(subcommand)]
        action: CommunityAction,
    },

    /// List groups whose name starts with NAME.
    Groups {
        /// Community name (prefix).
        name: String,
    },

    /// Show the permissions each group of a community holds.
    Perms {
        /// Community slug.
        slug: String,
    },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Create a user and its portal profile.
    Create {
        /// Username.
        #[arg(long)]
        username: String,
        /// Password.
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// List portal profiles.
    List,
    /// Delete a user and every community they administer.
    Delete {
        username: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CommunityAction {
    /// Create a community and provision its groups.
    Create {
        /// Display name.
        #[arg(long)]
        name: String,
        /// URL slug (derived from the name if omitted).
        #[arg(long)]
        slug: Option<String>,
        /// Username of the administrator.
        #[arg(long)]
        admin: String,
        /// Listing position.
        #[arg(long, default_value_t = 0)]
        order: i64,
        /// Slug of the parent community.
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        website: Option<String>,
    },
    /// Show a community.
    Show { slug: String },
    /// Rename a community; its groups follow.
    Rename { slug: String, name: String },
    /// Hand a community to another administrator.
    Transfer {
        slug: String,
        /// Username of the new administrator.
        admin: String,
    },
    /// Delete a community and its groups.
    Delete {
        slug: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },
    /// List communities.
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.output == "json";

    if let Err(e) = run(cli) {
        if json {
            let body = match e.downcast_ref::<portal_core::ServiceError>() {
                Some(se) => se.to_json(),
                None => serde_json::json!({ "code": "INTERNAL", "message": e.to_string() }),
            };
            println!("{}", body);
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        println!("portal v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            portal_core::ServiceConfig::load(path)?
        }
        None => portal_core::ServiceConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    let ctx = Context::open(&config, cli.output == "json")?;

    match cli.command {
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                password,
                email,
            } => commands::user::create(&ctx, &username, &password, email)?,
            UserAction::List => commands::user::list(&ctx)?,
            UserAction::Delete { username, yes } => {
                if !yes && !commands::confirm(&format!("Delete user \"{}\"?", username))? {
                    println!("Cancelled.");
                    return Ok(());
                }
                commands::user::delete(&ctx, &username)?
            }
        },

        Commands::Community { action } => match action {
            CommunityAction::Create {
                name,
                slug,
                admin,
                order,
                parent,
                email,
                website,
            } => commands::community::create(
                &ctx,
                commands::community::CreateArgs {
                    name,
                    slug,
                    admin,
                    order,
                    parent,
                    email,
                    website,
                },
            )?,
            CommunityAction::Show { slug } => commands::community::show(&ctx, &slug)?,
            CommunityAction::Rename { slug, name } => {
                commands::community::rename(&ctx, &slug, &name)?
            }
            CommunityAction::Transfer { slug, admin } => {
                commands::community::transfer(&ctx, &slug, &admin)?
            }
            CommunityAction::Delete { slug, yes } => {
                if !yes && !commands::confirm(&format!("Delete community \"{}\"?", slug))? {
                    println!("Cancelled.");
                    return Ok(());
                }
                commands::community::delete(&ctx, &slug)?
            }
            CommunityAction::List { limit, offset } => {
                commands::community::list(&ctx, limit, offset)?
            }
        },

        Commands::Groups { name } => commands::groups::list(&ctx, &name)?,

        Commands::Perms { slug } => commands::groups::perms(&ctx, &slug)?,

        Commands::Version => {}
    }

    Ok(())
}
