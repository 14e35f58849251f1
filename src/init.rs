use rusqlite::Connection;

use crate::{
    error::Result,
    eval::EvalConfig,
    register::register_functions,
    state::SharedState,
};

/// Create the range tables if they do not exist yet.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS range_clusters (
            cluster  TEXT NOT NULL,
            key      TEXT NOT NULL,
            position INTEGER NOT NULL,
            expr     TEXT NOT NULL,
            PRIMARY KEY (cluster, key, position)
        );

        CREATE TABLE IF NOT EXISTS range_groups (
            name     TEXT NOT NULL,
            position INTEGER NOT NULL,
            expr     TEXT NOT NULL,
            PRIMARY KEY (name, position)
        );
        "#,
    )?;

    Ok(())
}

pub fn init_connection(conn: &Connection) -> Result<SharedState> {
    init_connection_with(conn, EvalConfig::default())
}

/// Create the schema and register the range functions. The connection gets
/// a fresh, empty state that `range_reload()` or the caller populates. The
/// registered functions hold the only other handles to it, so it is freed
/// when the connection closes.
pub fn init_connection_with(conn: &Connection, config: EvalConfig) -> Result<SharedState> {
    create_schema(conn)?;

    let state = SharedState::default();
    register_functions(conn, &state, config)?;

    Ok(state)
}
