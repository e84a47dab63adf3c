// Persistence: SQLite meta.db and the workspace table.

pub mod meta_db;
pub mod workspaces;
