pub mod migration;
pub mod plot;

use crate::Result;
use deadpool_sqlite::{Config, Hook, HookError, Pool, Runtime};
use rusqlite::Connection;
use std::fs::create_dir_all;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|it| !it.as_os_str().is_empty()) {
        create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Applies pending migrations, then opens a pool whose connections share the
/// same pragmas as [`open_connection`].
pub fn pool(path: &Path) -> Result<Pool> {
    let mut conn = open_connection(path)?;
    migration::run(&mut conn)?;
    drop(conn);
    let pool_size = std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8);
    Config::new(path)
        .builder(Runtime::Tokio1)?
        .max_size(pool_size)
        .post_create(Hook::Fn(Box::new(|conn, _| {
            let conn = conn
                .lock()
                .map_err(|_| HookError::Message("Connection mutex is poisoned".into()))?;
            configure(&conn).map_err(|e| HookError::Message(e.to_string().into()))
        })))
        .build()
        .map_err(Into::into)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
