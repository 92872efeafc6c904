use portal_sql::SQLStore;

use crate::service::AuthError;

/// Initialize the SQLite schema for all auth resources.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), AuthError> {
    sql.exec_batch(
        "
        -- Users table: login accounts
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- SystersUser profiles: exactly one per user
        CREATE TABLE IF NOT EXISTS systers_users (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Groups table: role containers
        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Group members
        CREATE TABLE IF NOT EXISTS group_members (
            group_id TEXT NOT NULL,
            systers_user_id TEXT NOT NULL,
            added_at TEXT NOT NULL,
            PRIMARY KEY (group_id, systers_user_id),
            FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
            FOREIGN KEY (systers_user_id) REFERENCES systers_users(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(systers_user_id);

        -- Permission catalog
        CREATE TABLE IF NOT EXISTS permissions (
            codename TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            name TEXT NOT NULL
        );

        -- Model-level grants
        CREATE TABLE IF NOT EXISTS group_permissions (
            group_id TEXT NOT NULL,
            codename TEXT NOT NULL,
            PRIMARY KEY (group_id, codename),
            FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
            FOREIGN KEY (codename) REFERENCES permissions(codename) ON DELETE CASCADE
        );

        -- Object-level grants
        CREATE TABLE IF NOT EXISTS object_permissions (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            codename TEXT NOT NULL,
            object_ref TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
            FOREIGN KEY (codename) REFERENCES permissions(codename) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_object_permissions_group
            ON object_permissions(group_id, object_ref);
        CREATE INDEX IF NOT EXISTS idx_object_permissions_object
            ON object_permissions(object_ref);
        ",
    )?;
    Ok(())
}
