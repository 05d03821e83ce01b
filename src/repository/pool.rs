//! Connections to the harvester store.
//!
//! A file path or `sqlite:` URL selects SQLite. `postgres://` URLs need the
//! `postgres` feature and are served from a deadpool pool.

use std::path::Path;
use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

#[cfg(feature = "postgres")]
use diesel_async::pooled_connection::deadpool::Pool as DeadPool;
#[cfg(feature = "postgres")]
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
#[cfg(feature = "postgres")]
use diesel_async::AsyncPgConnection;

use super::util::store_error;

pub type DbError = diesel::result::Error;

pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

#[cfg(feature = "postgres")]
pub type PgConn = deadpool::managed::Object<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Scanner units write concurrently; each waits this long on a locked file.
const SQLITE_BUSY_TIMEOUT_MS: u32 = 30_000;

#[cfg(feature = "postgres")]
const PG_MAX_CONNECTIONS: usize = 10;

/// Where repositories get their connections.
#[derive(Clone)]
pub enum DbPool {
    /// Path of a SQLite file; every checkout opens its own connection.
    Sqlite(Arc<str>),
    #[cfg(feature = "postgres")]
    Postgres(DeadPool<AsyncPgConnection>),
}

impl DbPool {
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Self::postgres(url);
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        Ok(DbPool::Sqlite(path.into()))
    }

    pub fn sqlite_file(path: &Path) -> Self {
        DbPool::Sqlite(path.to_string_lossy().into())
    }

    #[cfg(feature = "postgres")]
    fn postgres(url: &str) -> Result<Self, DbError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        DeadPool::builder(manager)
            .max_size(PG_MAX_CONNECTIONS)
            .build()
            .map(DbPool::Postgres)
            .map_err(store_error)
    }

    #[cfg(not(feature = "postgres"))]
    fn postgres(_url: &str) -> Result<Self, DbError> {
        Err(store_error(
            "PostgreSQL URL given but the `postgres` feature is not enabled",
        ))
    }
}

#[doc(hidden)]
pub async fn open_sqlite(path: &str) -> Result<SqliteConn, DbError> {
    let mut conn = SqliteConn::establish(path).await.map_err(store_error)?;
    conn.batch_execute(&format!("PRAGMA busy_timeout = {SQLITE_BUSY_TIMEOUT_MS};"))
        .await?;
    Ok(conn)
}

#[cfg(feature = "postgres")]
#[doc(hidden)]
pub async fn checkout_pg(pool: &DeadPool<AsyncPgConnection>) -> Result<PgConn, DbError> {
    pool.get().await.map_err(store_error)
}

/// Run `$body` with `$conn` bound to a connection from `$pool`.
///
/// The two-body form is for statements whose SQL differs per backend:
///
/// ```ignore
/// with_conn!(self.pool,
///     sqlite: conn => conn.batch_execute("PRAGMA journal_mode = WAL;").await,
///     postgres: conn => conn.batch_execute("SET TIME ZONE 'UTC';").await
/// )
/// ```
#[macro_export]
macro_rules! with_conn {
    ($pool:expr, sqlite: $sqlite:ident => $sqlite_body:expr, postgres: $pg:ident => $pg_body:expr) => {{
        match &$pool {
            $crate::repository::pool::DbPool::Sqlite(path) => {
                let mut $sqlite = $crate::repository::pool::open_sqlite(path).await?;
                $sqlite_body
            }
            #[cfg(feature = "postgres")]
            $crate::repository::pool::DbPool::Postgres(pool) => {
                let mut $pg = $crate::repository::pool::checkout_pg(pool).await?;
                $pg_body
            }
        }
    }};
    ($pool:expr, $conn:ident => $body:expr) => {
        $crate::with_conn!($pool, sqlite: $conn => $body, postgres: $conn => $body)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_path(pool: &DbPool) -> Option<&str> {
        match pool {
            DbPool::Sqlite(path) => Some(&**path),
            #[cfg(feature = "postgres")]
            _ => None,
        }
    }

    #[test]
    fn test_sqlite_urls() {
        for url in ["data/decrees.db", "sqlite:data/decrees.db", "sqlite://data/decrees.db"] {
            let pool = DbPool::from_url(url).unwrap();
            assert_eq!(sqlite_path(&pool), Some("data/decrees.db"), "{url}");
        }
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn test_postgres_url_needs_feature() {
        assert!(DbPool::from_url("postgres://localhost/decrees").is_err());
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_postgres_url_selects_pool() {
        let pool = DbPool::from_url("postgresql://localhost/decrees").unwrap();
        assert!(matches!(pool, DbPool::Postgres(_)));
    }

    #[tokio::test]
    async fn test_each_checkout_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::sqlite_file(&dir.path().join("pool.db"));
        let created: Result<(), DbError> = async {
            with_conn!(pool, conn => conn.batch_execute("CREATE TABLE t (id INTEGER);").await)
        }
        .await;
        created.unwrap();
        let inserted: Result<(), DbError> = async {
            with_conn!(pool, conn => conn.batch_execute("INSERT INTO t VALUES (1);").await)
        }
        .await;
        inserted.unwrap();
    }
}
