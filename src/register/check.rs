use rusqlite::{Connection, functions::FunctionFlags};

use crate::{
    error::RangeError,
    eval::{EvalConfig, Query},
    register::ScalarFunction,
    state::SharedState,
};

/// `range_check(query)`: NULL when the query parses, the error message otherwise.
pub struct Check;

impl ScalarFunction for Check {
    fn register(
        conn: &Connection,
        _state: SharedState,
        _config: EvalConfig,
    ) -> rusqlite::Result<()> {
        conn.create_scalar_function(
            "range_check",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let query: String = ctx.get(0)?;
                Ok(match Query::parse(&query) {
                    Ok(_) => None,
                    Err(RangeError::Parse(message)) => Some(message),
                    Err(e) => Some(e.to_string()),
                })
            },
        )
    }
}
