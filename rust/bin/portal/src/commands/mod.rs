//! Subcommand implementations.

pub mod community;
pub mod groups;
pub mod user;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use auth::AuthService;
use ::community::CommunityService;
use portal_core::{ServiceConfig, ServiceError};
use portal_sql::{SQLStore, SqliteStore};
use serde::Serialize;
use tracing::debug;

/// Opened services plus output settings, shared by every command.
pub struct Context {
    pub auth: Arc<AuthService>,
    pub communities: Arc<CommunityService>,
    pub json: bool,
}

impl Context {
    /// Open the SQLite store named by `config` and initialise both services.
    pub fn open(config: &ServiceConfig, json: bool) -> Result<Self> {
        if let Some(dir) = &config.data_dir {
            std::fs::create_dir_all(dir)?;
        }
        let path = config.resolve_sqlite_path();
        debug!("opening {}", path.display());

        let sql: Arc<dyn SQLStore> = Arc::new(
            SqliteStore::open(&path)
                .map_err(|e| ServiceError::Storage(format!("failed to open SQL store: {}", e)))?,
        );
        let auth = AuthService::new(sql).map_err(ServiceError::from)?;
        let communities = CommunityService::new(Arc::clone(&auth)).map_err(ServiceError::from)?;
        Ok(Self {
            auth,
            communities,
            json,
        })
    }

    /// Print `value` as pretty JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Ask a yes/no question on stderr. Anything but `y` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{} [y/N]: ", question);
    std::io::stderr().flush()?;
    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(s.trim().eq_ignore_ascii_case("y"))
}

/// `-` for a missing value in table output.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
