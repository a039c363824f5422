//! SQL text for the session table and classification of schema errors.

/// `SQLITE_READONLY`: the database file or connection is read-only.
const SQLITE_READONLY: i32 = 8;
/// `SQLITE_AUTH`: an authorizer callback denied the statement.
const SQLITE_AUTH: i32 = 23;

/// Quote a table name for SQL, stripping any quotes it already carries.
pub(crate) fn quote_identifier(name: &str) -> String {
    let bare = name.trim_matches('"');
    format!("\"{}\"", bare.replace('"', "\"\""))
}

/// Every statement the store runs, rendered for one table.
#[derive(Debug, Clone)]
pub(crate) struct Queries {
    pub table: String,
    pub create_table: String,
    pub create_trigger: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
    pub select: String,
    pub cleanup: String,
    pub count: String,
}

impl Queries {
    /// Render the statements for `table`, with new rows expiring `max_age`
    /// seconds after insertion.
    pub fn new(table: &str, max_age: i64) -> Self {
        let quoted = quote_identifier(table);
        let trigger = quote_identifier(&format!("{}_modified_on", table.trim_matches('"')));

        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {quoted} (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 session_data BLOB, \
                 created_on TIMESTAMP DEFAULT CURRENT_TIMESTAMP, \
                 modified_on TIMESTAMP DEFAULT CURRENT_TIMESTAMP, \
                 expires_on TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
            ),
            create_trigger: format!(
                "CREATE TRIGGER IF NOT EXISTS {trigger} \
                 AFTER UPDATE OF session_data ON {quoted} FOR EACH ROW \
                 BEGIN UPDATE {quoted} SET modified_on = CURRENT_TIMESTAMP WHERE id = OLD.id; END"
            ),
            insert: format!(
                "INSERT INTO {quoted} (session_data, expires_on) \
                 VALUES (?, datetime('now', '{max_age:+} seconds'))"
            ),
            update: format!("UPDATE {quoted} SET session_data = ? WHERE id = ?"),
            delete: format!("DELETE FROM {quoted} WHERE id = ?"),
            select: format!(
                "SELECT session_data, expires_on < datetime('now') FROM {quoted} WHERE id = ?"
            ),
            cleanup: format!("DELETE FROM {quoted} WHERE expires_on < datetime('now')"),
            count: format!("SELECT COUNT(*) FROM {quoted}"),
            table: quoted,
        }
    }
}

/// Whether a failed DDL statement only means we lack the rights to run it.
///
/// Such failures are tolerated during initialization: the table is assumed
/// to have been provisioned by someone who has them.
pub fn is_permission_denied(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .and_then(|code| code.parse::<i32>().ok())
        // Extended result codes keep the primary code in the low byte.
        .map(|code| matches!(code & 0xff, SQLITE_READONLY | SQLITE_AUTH))
        .unwrap_or(false)
}
