//! Session store backed by an SQLite database.
//!
//! Sessions live in a single table. Each row holds the codec-encoded value
//! map and an expiry time fixed at insertion; the browser only ever sees the
//! signed row id. All statements are prepared once when the store opens and
//! are shared by request handlers and the background sweeper through the
//! same connection pool, leaving concurrency control to the database.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteStatement};
use sqlx::{Executor, Statement};
use tracing::{debug, info, warn};

use super::schema::{self, Queries};
use crate::cleanup::{spawn_cleanup, CleanupHandle, Purge};
use crate::codec::{self, CodecError, KeyPair, SecureCookie};
use crate::error::SessionError;
use crate::session::{self, CookieOptions, Session, Values};
use crate::Result;

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "sessions";

/// Largest accepted session lifetime, in either direction (100 years).
///
/// Beyond this SQLite's date functions and cookie `Expires` dates stop being
/// representable.
pub const MAX_SESSION_AGE: i64 = 86400 * 365 * 100;

/// Settings for opening a [`SqlStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Session table name; quoted automatically.
    pub table: String,
    /// Cookie attributes given to new sessions. `max_age` also sets the
    /// row lifetime.
    pub cookie: CookieOptions,
    /// Signing keys, primary first.
    pub key_pairs: Vec<KeyPair>,
}

impl StoreOptions {
    pub fn new(
        table: impl Into<String>,
        cookie_path: impl Into<String>,
        max_age: i64,
        key_pairs: Vec<KeyPair>,
    ) -> Self {
        Self {
            table: table.into(),
            cookie: CookieOptions::new(cookie_path, max_age),
            key_pairs,
        }
    }
}

struct Statements {
    insert: SqliteStatement<'static>,
    update: SqliteStatement<'static>,
    delete: SqliteStatement<'static>,
    select: SqliteStatement<'static>,
    cleanup: SqliteStatement<'static>,
    count: SqliteStatement<'static>,
}

impl Statements {
    async fn prepare(pool: &SqlitePool, queries: &Queries) -> Result<Self> {
        Ok(Self {
            insert: prepare(pool, "prepare insert", &queries.insert).await?,
            update: prepare(pool, "prepare update", &queries.update).await?,
            delete: prepare(pool, "prepare delete", &queries.delete).await?,
            select: prepare(pool, "prepare select", &queries.select).await?,
            cleanup: prepare(pool, "prepare cleanup", &queries.cleanup).await?,
            count: prepare(pool, "prepare count", &queries.count).await?,
        })
    }
}

async fn prepare(
    pool: &SqlitePool,
    stage: &'static str,
    sql: &str,
) -> Result<SqliteStatement<'static>> {
    let statement = pool
        .prepare(sql)
        .await
        .map_err(|source| SessionError::Initialization { stage, source })?;
    Ok(Statement::to_owned(&statement))
}

struct Inner {
    pool: SqlitePool,
    statements: Statements,
    /// Cookie codecs, holding the session lifetime as their max age.
    codecs: Vec<SecureCookie>,
    /// Codecs for stored values.
    blob_codecs: Vec<SecureCookie>,
    options: CookieOptions,
    table: String,
}

/// SQL-backed session store.
///
/// Cloning is cheap and every clone shares the pool and statements.
#[derive(Clone)]
pub struct SqlStore {
    inner: Arc<Inner>,
}

impl SqlStore {
    /// Connect to `database_url` (creating the file if needed) and open a
    /// store on it.
    pub async fn open(database_url: &str, options: StoreOptions) -> Result<Self> {
        let connect = SqliteConnectOptions::from_str(database_url)
            .map_err(|source| SessionError::Initialization {
                stage: "parse database url",
                source,
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect)
            .await
            .map_err(|source| SessionError::Initialization {
                stage: "connect",
                source,
            })?;

        Self::from_pool(pool, options).await
    }

    /// Open a store on an existing pool.
    ///
    /// Creates the table and its `modified_on` trigger if needed, then
    /// prepares every statement. Permission errors while creating the schema
    /// are logged and ignored; any other failure aborts. A max age beyond
    /// [`MAX_SESSION_AGE`] is rejected before the database is touched.
    pub async fn from_pool(pool: SqlitePool, options: StoreOptions) -> Result<Self> {
        let max_age = options.cookie.max_age;
        if !(-MAX_SESSION_AGE..=MAX_SESSION_AGE).contains(&max_age) {
            return Err(SessionError::InvalidMaxAge(max_age));
        }
        let queries = Queries::new(&options.table, max_age);

        ensure_schema(&pool, &queries).await?;
        let statements = Statements::prepare(&pool, &queries).await?;

        let codecs = codec::codecs_from_pairs(&options.key_pairs)
            .map_err(SessionError::Keys)?
            .into_iter()
            .map(|codec| codec.max_age(max_age))
            .collect::<Vec<_>>();
        // Row expiry is decided by `expires_on` alone; stored blobs carry no
        // age or length limit.
        let blob_codecs = codecs
            .iter()
            .cloned()
            .map(|codec| codec.max_age(0).max_length(0))
            .collect();

        info!(table = %queries.table, max_age, "Session store opened");

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                statements,
                codecs,
                blob_codecs,
                options: options.cookie,
                table: queries.table,
            }),
        })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Quoted name of the session table.
    pub fn table(&self) -> &str {
        &self.inner.table
    }

    /// Cookie attributes given to new sessions.
    pub fn cookie_options(&self) -> &CookieOptions {
        &self.inner.options
    }

    /// Insert a new row holding `values` and return its id.
    pub async fn create(&self, name: &str, values: &Values) -> Result<String> {
        let encoded = codec::encode_multi(name, values, &self.inner.blob_codecs)
            .map_err(SessionError::Encode)?;

        let result = self
            .inner
            .statements
            .insert
            .query()
            .bind(encoded.into_bytes())
            .execute(&self.inner.pool)
            .await?;

        let id = result.last_insert_rowid().to_string();
        debug!(session_id = %id, "Session row created");
        Ok(id)
    }

    /// Fetch the values stored for `id`.
    ///
    /// Expired rows are reported as [`SessionError::Expired`] and left in
    /// place for the sweeper.
    pub async fn load(&self, name: &str, id: &str) -> Result<Values> {
        let row_id = parse_id(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let row: Option<(Option<Vec<u8>>, Option<i64>)> = self
            .inner
            .statements
            .select
            .query_as()
            .bind(row_id)
            .fetch_optional(&self.inner.pool)
            .await?;

        let (data, expired) = row.ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if expired.unwrap_or(0) != 0 {
            return Err(SessionError::Expired(id.to_string()));
        }

        let data = data
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(SessionError::Decode(CodecError::Malformed))?;
        codec::decode_multi(name, &data, &self.inner.blob_codecs).map_err(SessionError::Decode)
    }

    /// Replace the values stored for `id`. The expiry time is unchanged.
    pub async fn update(&self, name: &str, id: &str, values: &Values) -> Result<()> {
        let row_id = parse_id(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let encoded = codec::encode_multi(name, values, &self.inner.blob_codecs)
            .map_err(SessionError::Encode)?;

        let result = self
            .inner
            .statements
            .update
            .query()
            .bind(encoded.into_bytes())
            .bind(row_id)
            .execute(&self.inner.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Delete the row for `id`. Deleting a missing row is not an error.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let Some(row_id) = parse_id(id) else {
            return Ok(());
        };

        self.inner
            .statements
            .delete
            .query()
            .bind(row_id)
            .execute(&self.inner.pool)
            .await?;

        debug!(session_id = %id, "Session row deleted");
        Ok(())
    }

    /// Delete every row whose expiry time has passed.
    ///
    /// Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = self
            .inner
            .statements
            .cleanup
            .query()
            .execute(&self.inner.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of rows in the session table, expired ones included.
    pub async fn session_count(&self) -> Result<i64> {
        let (count,): (i64,) = self
            .inner
            .statements
            .count
            .query_as()
            .fetch_one(&self.inner.pool)
            .await?;
        Ok(count)
    }

    /// Close the pool. Later calls on any clone fail with a database error.
    ///
    /// Stop any running cleanup first.
    pub async fn close(&self) {
        self.inner.pool.close().await;
        info!(table = %self.inner.table, "Session store closed");
    }

    /// Build the session called `name` for a request.
    ///
    /// The session cookie is decoded and its row loaded. A missing, forged
    /// or expired cookie, or a row that cannot be loaded, yields a fresh
    /// session with `is_new` set rather than an error.
    pub async fn new_session(&self, headers: &HeaderMap, name: &str) -> Session {
        let mut session = Session::new(name, self.inner.options.clone());

        let Some(token) = session::read_cookie(headers, name) else {
            return session;
        };

        let id: String = match codec::decode_multi(name, &token, &self.inner.codecs) {
            Ok(id) => id,
            Err(e) => {
                debug!(cookie = name, error = %e, "Ignoring undecodable session cookie");
                return session;
            }
        };

        match self.load(name, &id).await {
            Ok(values) => {
                session.id = id;
                session.values = values;
                session.is_new = false;
            }
            Err(e) if e.is_unauthenticated() => {
                debug!(session_id = %id, error = %e, "Starting a fresh session");
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Failed to load session, starting a fresh one");
            }
        }

        session
    }

    /// Persist `session` and append its cookie to `response`.
    ///
    /// Unsaved sessions get a new row. Saved ones are updated in place, or
    /// re-created if their row has been swept in the meantime.
    pub async fn save(&self, session: &mut Session, response: &mut HeaderMap) -> Result<()> {
        if session.is_new || !session.is_persisted() {
            self.insert(session).await?;
        } else {
            match self.update(session.name(), &session.id, &session.values).await {
                Ok(()) => {}
                Err(SessionError::NotFound(_)) => {
                    debug!(session_id = %session.id, "Session row gone, re-creating");
                    self.insert(session).await?;
                }
                Err(e) => return Err(e),
            }
        }

        let encoded = codec::encode_multi(session.name(), &session.id, &self.inner.codecs)
            .map_err(SessionError::Encode)?;
        let cookie = session::new_cookie(session.name(), &encoded, &session.options);
        session::set_cookie(response, &cookie)
    }

    async fn insert(&self, session: &mut Session) -> Result<()> {
        session.id = self.create(session.name(), &session.values).await?;
        session.is_new = false;
        Ok(())
    }

    /// Delete `session`: expire its cookie, clear its values and remove its
    /// row.
    pub async fn delete(&self, session: &mut Session, response: &mut HeaderMap) -> Result<()> {
        let cookie = session::new_cookie(session.name(), "", &session.options.expired());
        session::set_cookie(response, &cookie)?;
        session.values.clear();

        if session.is_persisted() {
            self.remove(&session.id).await?;
        }
        Ok(())
    }

    /// Start purging expired rows every `interval` in the background.
    ///
    /// A zero interval selects [`DEFAULT_CLEANUP_INTERVAL`](crate::cleanup::DEFAULT_CLEANUP_INTERVAL).
    /// Must be called from within a tokio runtime.
    pub fn cleanup(&self, interval: Duration) -> CleanupHandle {
        spawn_cleanup(self.clone(), interval)
    }

    /// Stop a cleanup started with [`cleanup`](Self::cleanup) and wait for it
    /// to finish.
    pub async fn stop_cleanup(&self, handle: CleanupHandle) {
        handle.stop().await;
    }
}

impl Purge for SqlStore {
    async fn purge(&self) -> Result<u64> {
        self.purge_expired().await
    }
}

impl fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlStore")
            .field("table", &self.inner.table)
            .field("options", &self.inner.options)
            .field("codecs", &self.inner.codecs.len())
            .finish()
    }
}

async fn ensure_schema(pool: &SqlitePool, queries: &Queries) -> Result<()> {
    let steps = [
        ("create table", &queries.create_table),
        ("create trigger", &queries.create_trigger),
    ];

    for (stage, sql) in steps {
        match pool.execute(sql.as_str()).await {
            Ok(_) => {}
            Err(e) if schema::is_permission_denied(&e) => {
                warn!(
                    table = %queries.table,
                    stage,
                    error = %e,
                    "Schema change not permitted, assuming the table is provisioned"
                );
            }
            Err(source) => return Err(SessionError::Initialization { stage, source }),
        }
    }
    Ok(())
}

fn parse_id(id: &str) -> Option<i64> {
    id.parse().ok()
}
