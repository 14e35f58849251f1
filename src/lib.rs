pub mod error;
pub mod eval;
pub mod init;
pub mod lex;
pub mod load;
pub mod node;
pub mod parse;
pub mod register;
pub mod state;

pub use crate::{
    error::{RangeError, Result},
    eval::{EvalConfig, Query, eval_range, eval_range_with},
    state::{Cluster, SharedState, State},
};

#[cfg(feature = "extension")]
mod extension {
    use std::{
        ffi::{CString, c_char, c_int},
        mem::forget,
        ptr,
    };

    use rusqlite::{
        Connection,
        ffi::{
            SQLITE_ERROR,
            SQLITE_OK,
            rusqlite_extension_init2,
            sqlite3,
            sqlite3_api_routines,
            sqlite3_malloc,
        },
    };

    use crate::{eval::EvalConfig, init::init_connection_with};

    /// Initialize the extension entry point for SQLite.
    ///
    /// # Safety
    /// Must only be invoked by SQLite when loading the extension.
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn sqlite3_sqlrange_init(
        db: *mut sqlite3,
        pz_err_msg: *mut *mut c_char,
        p_api: *mut sqlite3_api_routines,
    ) -> c_int {
        let _ = env_logger::try_init();

        // Safety: called by SQLite loader
        if let Err(e) = unsafe { rusqlite_extension_init2(p_api) } {
            set_err_message(pz_err_msg, &format!("failed to init SQLite API: {e:?}"));
            return SQLITE_ERROR;
        }

        let conn = match unsafe { Connection::from_handle(db) } {
            Ok(conn) => conn,
            Err(e) => {
                set_err_message(pz_err_msg, &format!("sqlrange initialization failed: {e}"));
                return SQLITE_ERROR;
            }
        };

        let result = init_connection_with(&conn, EvalConfig::from_env());

        // Ensure we don’t close SQLite’s internal handle
        forget(conn);

        match result {
            Ok(_) => {
                log::info!("sqlrange: functions registered");
                SQLITE_OK
            }
            Err(e) => {
                set_err_message(pz_err_msg, &format!("sqlrange initialization failed: {e}"));
                SQLITE_ERROR
            }
        }
    }

    /// Set the SQLite extension error message.
    ///
    /// Allocates a C string using `sqlite3_malloc` and writes its pointer to `pz_err_msg`.
    fn set_err_message(pz_err_msg: *mut *mut c_char, msg: &str) {
        unsafe {
            if pz_err_msg.is_null() {
                return;
            }

            let msg_owned = CString::new(msg.replace('\0', " ")).unwrap_or_default();
            let bytes = msg_owned.as_bytes_with_nul();

            // Allocate memory that SQLite expects to own
            let buf = sqlite3_malloc(bytes.len() as i32) as *mut c_char;
            if buf.is_null() {
                return;
            }

            ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buf, bytes.len());
            *pz_err_msg = buf;
        }
    }
}
