//! Page-window queries over `rusqlite`.
//!
//! A query is run twice: once wrapped in `COUNT(*)` to size the result, and
//! once with the dialect's `LIMIT`/`OFFSET` appended. Requested page sizes
//! are clamped to `max_limit`, and a page past the end either resets to the
//! first page (`overflow`) or comes back empty.

use rusqlite::{Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StorageError};
use crate::json::{Composite, DeclaredType, Described, FieldDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Sqlite,
    MySql,
    Postgres,
}

impl DbType {
    /// Detect the database from a connection URL or a file path.
    pub fn from_url(url: &str) -> Option<DbType> {
        let url = url.trim().to_ascii_lowercase();
        let url = url.strip_prefix("jdbc:").unwrap_or(&url);

        if url.starts_with("sqlite:") || url.ends_with(".db") || url.ends_with(".sqlite") {
            Some(DbType::Sqlite)
        } else if url.starts_with("mysql:") || url.starts_with("mariadb:") {
            Some(DbType::MySql)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Some(DbType::Postgres)
        } else {
            None
        }
    }

    /// Append this dialect's window clause to `sql`.
    pub fn paged_sql(self, sql: &str, offset: u64, limit: u64) -> String {
        let sql = trim_statement(sql);
        match self {
            DbType::MySql if offset == 0 => format!("{sql} LIMIT {limit}"),
            DbType::MySql => format!("{sql} LIMIT {offset},{limit}"),
            DbType::Sqlite | DbType::Postgres => format!("{sql} LIMIT {limit} OFFSET {offset}"),
        }
    }
}

/// Wrap `sql` so it returns the number of rows it would produce.
pub fn count_sql(sql: &str) -> String {
    format!("SELECT COUNT(*) FROM ({}) AS page_total", trim_statement(sql))
}

fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Reset to the first page when the requested page is past the end.
    pub overflow: bool,
    /// Upper bound on the page size; `None` disables it.
    pub max_limit: Option<u64>,
    /// Dialect override; detected from the connection when unset.
    pub db_type: Option<DbType>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            overflow: false,
            max_limit: Some(500),
            db_type: None,
        }
    }
}

/// A 1-based page request. `size == 0` asks for every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub current: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn new(current: u64, size: u64) -> Self {
        Self { current, size }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub size: u64,
    pub current: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    fn empty(current: u64, size: u64, total: u64) -> Self {
        let pages = if size == 0 { 1 } else { total.div_ceil(size) };
        Self {
            records: Vec::new(),
            total,
            size,
            current,
            pages,
        }
    }

    pub fn offset(&self) -> u64 {
        self.current.saturating_sub(1).saturating_mul(self.size)
    }
}

impl<T: Described> Composite for Page<T> {
    const NAME: &'static str = "Page";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("records", <Vec<T>>::declared_type()),
            FieldDescriptor::new("total", u64::declared_type()),
            FieldDescriptor::new("size", u64::declared_type()),
            FieldDescriptor::new("current", u64::declared_type()),
            FieldDescriptor::new("pages", u64::declared_type()),
        ]
    }
}

impl<T: Described> Described for Page<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::composite::<Self>()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaginationInterceptor {
    config: PaginationConfig,
}

impl PaginationInterceptor {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// The configured dialect, else the one detected from the connection's
    /// database path. Connections without a recognizable path are SQLite.
    pub fn dialect(&self, conn: &Connection) -> DbType {
        self.config
            .db_type
            .or_else(|| conn.path().and_then(DbType::from_url))
            .unwrap_or(DbType::Sqlite)
    }

    /// Clamp a requested size to `max_limit`. An unbounded request counts as
    /// exceeding the limit.
    pub fn effective_size(&self, requested: u64) -> u64 {
        match self.config.max_limit {
            Some(limit) if limit > 0 && (requested == 0 || requested > limit) => limit,
            _ => requested,
        }
    }

    /// Run `sql` for one page of results.
    pub fn paginate<T, F>(
        &self,
        conn: &Connection,
        sql: &str,
        params: &[&dyn ToSql],
        request: PageRequest,
        mut map_row: F,
    ) -> Result<Page<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let dialect = self.dialect(conn);
        let size = self.effective_size(request.size);
        let current = request.current.max(1);

        if size == 0 {
            let mut stmt = conn.prepare(trim_statement(sql))?;
            let records = stmt
                .query_map(params, |row| map_row(row))?
                .collect::<rusqlite::Result<Vec<T>>>()?;
            let total = records.len() as u64;
            return Ok(Page {
                records,
                ..Page::empty(1, 0, total)
            });
        }

        let total: i64 = conn.query_row(&count_sql(sql), params, |row| row.get(0))?;
        let total = u64::try_from(total)
            .map_err(|_| StorageError::Pagination(format!("negative row count {total}")))?;

        let mut page = Page::empty(current, size, total);
        if total == 0 {
            return Ok(page);
        }

        if page.current > page.pages {
            if !self.config.overflow {
                tracing::debug!(
                    current = page.current,
                    pages = page.pages,
                    "Requested page is past the end"
                );
                return Ok(page);
            }
            page.current = 1;
        }

        let paged = dialect.paged_sql(sql, page.offset(), size);
        tracing::debug!(sql = %paged, total, "Querying page");
        let mut stmt = conn.prepare(&paged)?;
        page.records = stmt
            .query_map(params, |row| map_row(row))?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::JsonMapper;

    fn db(rows: u32) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE files (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        for id in 1..=rows {
            let name = (id % 2 == 0).then(|| format!("file-{id}"));
            conn.execute(
                "INSERT INTO files (id, name) VALUES (?1, ?2)",
                rusqlite::params![id, name],
            )
            .unwrap();
        }
        conn
    }

    fn ids(
        interceptor: &PaginationInterceptor,
        conn: &Connection,
        request: PageRequest,
    ) -> Page<u32> {
        interceptor
            .paginate(
                conn,
                "SELECT id FROM files ORDER BY id;",
                &[],
                request,
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_dialects() {
        let sql = "SELECT * FROM t";
        assert_eq!(DbType::MySql.paged_sql(sql, 0, 10), "SELECT * FROM t LIMIT 10");
        assert_eq!(DbType::MySql.paged_sql(sql, 20, 10), "SELECT * FROM t LIMIT 20,10");
        assert_eq!(
            DbType::Postgres.paged_sql(sql, 20, 10),
            "SELECT * FROM t LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            count_sql("SELECT * FROM t ;"),
            "SELECT COUNT(*) FROM (SELECT * FROM t) AS page_total"
        );
    }

    #[test]
    fn test_detect_db_type() {
        assert_eq!(DbType::from_url("jdbc:mysql://db:3306/files"), Some(DbType::MySql));
        assert_eq!(DbType::from_url("postgresql://db/files"), Some(DbType::Postgres));
        assert_eq!(DbType::from_url("sqlite::memory:"), Some(DbType::Sqlite));
        assert_eq!(DbType::from_url("/var/data/files.db"), Some(DbType::Sqlite));
        assert_eq!(DbType::from_url("oracle:thin:@db"), None);
    }

    #[test]
    fn test_dialect_from_connection() {
        let tmp = tempfile::TempDir::new().unwrap();
        let conn = Connection::open(tmp.path().join("files.db")).unwrap();
        let interceptor = PaginationInterceptor::default();
        assert_eq!(interceptor.dialect(&conn), DbType::Sqlite);
        assert_eq!(
            interceptor.dialect(&Connection::open_in_memory().unwrap()),
            DbType::Sqlite
        );

        let pinned = PaginationInterceptor::new(PaginationConfig {
            db_type: Some(DbType::MySql),
            ..PaginationConfig::default()
        });
        assert_eq!(pinned.dialect(&conn), DbType::MySql);
    }

    #[test]
    fn test_first_and_middle_pages() {
        let conn = db(25);
        let interceptor = PaginationInterceptor::default();

        let first = ids(&interceptor, &conn, PageRequest::new(1, 10));
        assert_eq!(first.records, (1..=10).collect::<Vec<_>>());
        assert_eq!((first.total, first.pages), (25, 3));

        let last = ids(&interceptor, &conn, PageRequest::new(3, 10));
        assert_eq!(last.records, (21..=25).collect::<Vec<_>>());
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let conn = db(5);
        let page = ids(&PaginationInterceptor::default(), &conn, PageRequest::new(0, 2));
        assert_eq!(page.current, 1);
        assert_eq!(page.records, vec![1, 2]);
    }

    #[test]
    fn test_overflow_disabled_returns_empty() {
        let conn = db(5);
        let page = ids(&PaginationInterceptor::default(), &conn, PageRequest::new(9, 2));
        assert!(page.records.is_empty());
        assert_eq!((page.total, page.pages, page.current), (5, 3, 9));
    }

    #[test]
    fn test_overflow_enabled_resets_to_first_page() {
        let conn = db(5);
        let interceptor = PaginationInterceptor::new(PaginationConfig {
            overflow: true,
            ..PaginationConfig::default()
        });
        let page = ids(&interceptor, &conn, PageRequest::new(9, 2));
        assert_eq!(page.current, 1);
        assert_eq!(page.records, vec![1, 2]);
    }

    #[test]
    fn test_size_is_clamped_to_max_limit() {
        let conn = db(30);
        let interceptor = PaginationInterceptor::new(PaginationConfig {
            max_limit: Some(8),
            ..PaginationConfig::default()
        });
        assert_eq!(interceptor.effective_size(0), 8);
        assert_eq!(interceptor.effective_size(100), 8);
        assert_eq!(interceptor.effective_size(5), 5);

        let page = ids(&interceptor, &conn, PageRequest::new(1, 100));
        assert_eq!(page.size, 8);
        assert_eq!(page.records.len(), 8);
        assert_eq!(page.pages, 4);
    }

    #[test]
    fn test_unbounded_request_without_limit_returns_all() {
        let conn = db(12);
        let interceptor = PaginationInterceptor::new(PaginationConfig {
            max_limit: None,
            ..PaginationConfig::default()
        });
        let page = ids(&interceptor, &conn, PageRequest::new(4, 0));
        assert_eq!(page.records.len(), 12);
        assert_eq!((page.total, page.pages, page.current), (12, 1, 1));
    }

    #[test]
    fn test_params_bind_for_count_and_window() {
        let conn = db(20);
        let page = PaginationInterceptor::default()
            .paginate(
                &conn,
                "SELECT id FROM files WHERE id > ?1 ORDER BY id",
                rusqlite::params![15],
                PageRequest::new(2, 3),
                |row| row.get::<_, u32>(0),
            )
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.records, vec![19, 20]);
    }

    #[test]
    fn test_empty_result() {
        let conn = db(0);
        let page = ids(&PaginationInterceptor::default(), &conn, PageRequest::default());
        assert!(page.records.is_empty());
        assert_eq!((page.total, page.pages), (0, 0));
    }

    #[test]
    fn test_page_json_uses_placeholders_for_rows() {
        #[derive(Serialize)]
        struct FileRow {
            id: u32,
            name: Option<String>,
        }
        crate::describe!(FileRow {
            id: u32,
            name: Option<String>,
        });

        let conn = db(2);
        let page = PaginationInterceptor::default()
            .paginate(
                &conn,
                "SELECT id, name FROM files ORDER BY id",
                &[],
                PageRequest::new(1, 10),
                |row| {
                    Ok(FileRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .unwrap();

        let json = JsonMapper::new().to_json(&page).unwrap();
        assert_eq!(
            json,
            r#"{"records":[{"id":1,"name":""},{"id":2,"name":"file-2"}],"total":2,"size":10,"current":1,"pages":1}"#
        );
    }
}
