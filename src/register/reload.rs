use std::panic::AssertUnwindSafe;

use rusqlite::{Connection, functions::FunctionFlags};

use crate::{
    eval::EvalConfig,
    load,
    register::{ScalarFunction, user_error},
    state::SharedState,
};

/// `range_reload()`: rebuild the connection's state from the range tables.
pub struct Reload;

impl ScalarFunction for Reload {
    fn register(
        conn: &Connection,
        state: SharedState,
        _config: EvalConfig,
    ) -> rusqlite::Result<()> {
        let state = AssertUnwindSafe(state);

        conn.create_scalar_function("range_reload", 0, FunctionFlags::SQLITE_UTF8, move |ctx| {
            // Safety: the handle belongs to the connection running this
            // function and is not closed here.
            let db = unsafe { ctx.get_connection()? };
            let count = load::reload(&db, &state).map_err(user_error)?;
            Ok(count as i64)
        })
    }
}
