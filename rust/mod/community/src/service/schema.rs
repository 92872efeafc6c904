use portal_sql::SQLStore;

use crate::service::CommunityError;

/// Initialize the community tables. Requires the auth schema.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), CommunityError> {
    sql.exec_batch(
        "
        CREATE TABLE IF NOT EXISTS communities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            sort_order INTEGER NOT NULL DEFAULT 0,
            community_admin TEXT NOT NULL,
            parent_id TEXT,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (community_admin) REFERENCES systers_users(id),
            FOREIGN KEY (parent_id) REFERENCES communities(id) ON DELETE SET NULL
        );
        CREATE INDEX IF NOT EXISTS idx_communities_order ON communities(sort_order, name);

        CREATE TABLE IF NOT EXISTS community_members (
            community_id TEXT NOT NULL,
            systers_user_id TEXT NOT NULL,
            joined_at TEXT NOT NULL,
            PRIMARY KEY (community_id, systers_user_id),
            FOREIGN KEY (community_id) REFERENCES communities(id) ON DELETE CASCADE,
            FOREIGN KEY (systers_user_id) REFERENCES systers_users(id) ON DELETE CASCADE
        );
        ",
    )?;
    Ok(())
}
