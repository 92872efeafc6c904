mod group;
mod permission;
mod user;

pub use group::*;
pub use permission::*;
pub use user::*;
