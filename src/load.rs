use std::collections::HashMap;

use rusqlite::{Connection, params};

use crate::{
    error::Result,
    state::{Cluster, SharedState, State},
};

/// Build a fresh [`State`] from the `range_clusters` and `range_groups`
/// tables. Values under a key keep their `position` order.
pub fn load_state(conn: &Connection) -> Result<State> {
    let mut clusters: HashMap<String, Cluster> = HashMap::new();

    let mut stmt = conn.prepare(
        "SELECT cluster, key, expr FROM range_clusters ORDER BY cluster, key, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    for row in rows {
        let (cluster, key, expr) = row?;
        clusters.entry(cluster).or_default().push(&key, expr);
    }

    let mut groups = Cluster::new();
    let mut stmt = conn.prepare("SELECT name, expr FROM range_groups ORDER BY name, position")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    for row in rows {
        let (name, expr) = row?;
        groups.push(&name, expr);
    }

    let mut state = State::new();
    for (name, cluster) in clusters {
        state.register_cluster(&name, cluster);
    }
    state.set_groups(groups);

    Ok(state)
}

/// Replace the shared state with the table contents. Returns the number of
/// clusters loaded.
pub fn reload(conn: &Connection, shared: &SharedState) -> Result<usize> {
    let state = load_state(conn)?;
    let count = state.clusters().count();

    *shared.write() = state;
    log::info!("reloaded {count} clusters");

    Ok(count)
}

/// Persist a cluster, replacing any rows previously stored under `name`.
///
/// Runs in its own transaction: on error the old rows are kept. Must not be
/// called while `conn` already has a transaction open.
pub fn store_cluster(conn: &Connection, name: &str, cluster: &Cluster) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM range_clusters WHERE cluster = ?1", [name])?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO range_clusters (cluster, key, position, expr) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (key, values) in cluster.iter() {
            for (position, expr) in values.iter().enumerate() {
                stmt.execute(params![name, key, position as i64, expr])?;
            }
        }
    }

    tx.commit()?;
    Ok(())
}

/// Persist the groups table, replacing all stored groups. Transactional like
/// [`store_cluster`].
pub fn store_groups(conn: &Connection, groups: &Cluster) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM range_groups", [])?;

    {
        let mut stmt =
            tx.prepare("INSERT INTO range_groups (name, position, expr) VALUES (?1, ?2, ?3)")?;
        for (name, values) in groups.iter() {
            for (position, expr) in values.iter().enumerate() {
                stmt.execute(params![name, position as i64, expr])?;
            }
        }
    }

    tx.commit()?;
    Ok(())
}
