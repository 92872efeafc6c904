//! Community module: named sub-organisations of the portal.
//!
//! Creating a community provisions one permission group per entry of
//! [`permissions::GROUP_TEMPLATES`], grants each group its permissions (some
//! model-wide, some scoped to the community row) and makes the admin a member
//! of the admin group. Deleting the community removes its groups.
//!
//! The provisioning runs from lifecycle [`signals`] connected by
//! [`CommunityService::new`]; the underlying steps live in [`utils`] and can be
//! driven directly once the default receivers are disconnected.

pub mod model;
pub mod permissions;
pub mod receivers;
pub mod service;
pub mod signals;
pub mod utils;

pub use model::{Community, CreateCommunity};
pub use service::{CommunityError, CommunityService};
pub use signals::{Signal, SignalEvent, Signals};
