use std::panic::AssertUnwindSafe;

use rusqlite::{Connection, functions::FunctionFlags};

use crate::{
    eval::EvalConfig,
    register::{ScalarFunction, evaluate, user_error},
    state::SharedState,
};

/// `range_count(query)`
pub struct Count;

impl ScalarFunction for Count {
    fn register(
        conn: &Connection,
        state: SharedState,
        config: EvalConfig,
    ) -> rusqlite::Result<()> {
        let state = AssertUnwindSafe(state);

        conn.create_scalar_function("range_count", 1, FunctionFlags::SQLITE_UTF8, move |ctx| {
            let query: String = ctx.get(0)?;
            let hosts = evaluate(&state, config, &query).map_err(user_error)?;
            Ok(hosts.len() as i64)
        })
    }
}
