pub mod check;
pub mod count;
pub mod expand;
pub mod reload;

use rusqlite::Connection;

use crate::{
    error::{RangeError, Result},
    eval::{EvalConfig, Query},
    register::{check::Check, count::Count, expand::Expand, reload::Reload},
    state::SharedState,
};

trait ScalarFunction {
    fn register(
        conn: &Connection,
        state: SharedState,
        config: EvalConfig,
    ) -> rusqlite::Result<()>;
}

fn user_error(e: RangeError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(e))
}

fn evaluate(state: &SharedState, config: EvalConfig, query: &str) -> Result<Vec<String>> {
    let query = Query::parse(query)?;
    let state = state.read();
    query.evaluate_with(&state, config)
}

/// Register all range scalar functions on `conn`, bound to `state`.
pub(crate) fn register_functions(
    conn: &Connection,
    state: &SharedState,
    config: EvalConfig,
) -> rusqlite::Result<()> {
    Check::register(conn, state.clone(), config)?;
    Count::register(conn, state.clone(), config)?;
    Expand::register(conn, state.clone(), config)?;
    Reload::register(conn, state.clone(), config)?;
    Ok(())
}
