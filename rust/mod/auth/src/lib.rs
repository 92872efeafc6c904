//! Auth module: login accounts, portal profiles, groups and permissions.
//!
//! # Resources
//!
//! - **User** — login account (username + argon2id password hash)
//! - **SystersUser** — one-to-one profile wrapping a User; the identity other
//!   modules reference
//! - **Group** — named role container with SystersUser members
//! - **Permission** — catalog entry `(codename, model)`
//! - **Group permission** — model-level grant of a codename to a group
//! - **Object permission** — grant of a codename to a group, scoped to a
//!   single record (`"{model}:{id}"`)
//!
//! # Usage
//!
//! ```ignore
//! use auth::AuthService;
//!
//! let auth = AuthService::new(sql)?;
//! let user = auth.create_user(CreateUser { username: "ada".into(), .. })?;
//! let profile = auth.get_systers_user_by_user(&user.id)?;
//! ```

pub mod model;
pub mod service;

pub use service::{AuthError, AuthService};
