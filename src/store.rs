// store.rs - 媒体库存储
//! files 表的存储抽象和 SQLite 实现
//!
//! 查询结果通过只能向前移动的游标返回，用完需要关闭。

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::engine::{EngineError, EngineResult};
use crate::query::{escape_like, CompiledPredicate, SqlArg};
use crate::schema::{self, MediaRecord, StoredValue, COL_DATA, COL_ID, COL_PARENT, FILES_TABLE};

/// 查询结果中的一行
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<StoredValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<StoredValue>) -> Self {
        Self { columns, values }
    }

    /// 按列名取值；投影里没有该列时返回 None
    pub fn get(&self, column: &str) -> Option<&StoredValue> {
        self.columns.iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(StoredValue::as_i64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(StoredValue::as_str)
    }
}

/// 只能向前移动的结果游标
pub trait Cursor: Send {
    /// 取下一行；结束或已关闭时返回 None
    fn next_row(&mut self) -> Option<Row>;

    /// 释放游标，之后 next_row 总是返回 None
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// 结果集已经完整取出的游标
pub struct RowsCursor {
    rows: std::vec::IntoIter<Row>,
    closed: bool,
}

impl RowsCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows: rows.into_iter(), closed: false }
    }
}

impl Cursor for RowsCursor {
    fn next_row(&mut self) -> Option<Row> {
        if self.closed {
            return None;
        }
        self.rows.next()
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows = Vec::new().into_iter();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// 一次查询的全部参数
#[derive(Debug, Clone)]
pub struct StoreQuery<'a> {
    pub table: &'a str,
    pub columns: &'a [&'a str],
    pub selection: &'a CompiledPredicate,
    pub order_by: Option<&'a str>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub distinct: bool,
}

impl<'a> StoreQuery<'a> {
    pub fn new(table: &'a str, columns: &'a [&'a str], selection: &'a CompiledPredicate) -> Self {
        Self {
            table,
            columns,
            selection,
            order_by: None,
            limit: None,
            offset: 0,
            distinct: false,
        }
    }

    pub fn order_by(mut self, order_by: Option<&'a str>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// 生成 SQL 文本；分页参数以占位符形式追加在最后
    pub fn to_sql(&self) -> String {
        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            self.columns.join(", "),
            self.table,
        );
        if !self.selection.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.selection.template);
        }
        if let Some(order_by) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if self.limit.is_some() || self.offset > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
        }
        sql
    }

    fn bound_args(&self) -> Vec<SqlArg> {
        let mut args = self.selection.args.clone();
        if self.limit.is_some() || self.offset > 0 {
            // SQLite 中 LIMIT -1 表示不限制
            args.push(SqlArg::Integer(self.limit.map(|l| l as i64).unwrap_or(-1)));
            args.push(SqlArg::Integer(self.offset as i64));
        }
        args
    }
}

/// 媒体库存储接口
pub trait MediaStore: Send + Sync {
    /// 执行查询，返回游标
    fn query(&self, query: &StoreQuery<'_>) -> EngineResult<Box<dyn Cursor>>;

    /// 插入或更新一条记录（按路径去重），返回行 ID
    fn upsert(&self, record: &MediaRecord) -> EngineResult<i64>;

    /// 删除路径本身及其下所有记录，返回删除的行数
    fn remove(&self, path: &str) -> EngineResult<usize>;

    /// 按路径查找行 ID
    fn find_id(&self, path: &str) -> EngineResult<Option<i64>>;

    /// 路径对应记录的修改时间（秒）
    fn modified_time(&self, path: &str) -> EngineResult<Option<i64>>;

    fn count(&self) -> EngineResult<usize>;
}

impl ToSql for SqlArg {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlArg::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlArg::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlArg::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

impl ToSql for StoredValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StoredValue::Null => ToSqlOutput::Owned(Value::Null),
            StoredValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            StoredValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            StoredValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

fn stored_value(value: ValueRef<'_>) -> StoredValue {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => StoredValue::Null,
        ValueRef::Integer(v) => StoredValue::Integer(v),
        ValueRef::Real(v) => StoredValue::Real(v),
        ValueRef::Text(bytes) => StoredValue::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// SQLite 实现
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> EngineResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> EngineResult<Self> {
        conn.execute_batch(&schema::build_schema())?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn.lock()
            .map_err(|_| EngineError::Store("connection lock poisoned".to_string()))
    }
}

impl MediaStore for SqliteStore {
    fn query(&self, query: &StoreQuery<'_>) -> EngineResult<Box<dyn Cursor>> {
        let sql = query.to_sql();
        let args = query.bound_args();
        debug!("[Store] {} {:?}", sql, args);

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns: Arc<[String]> = stmt.column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(stored_value(row.get_ref(i)?));
            }
            out.push(Row::new(columns.clone(), values));
        }
        Ok(Box::new(RowsCursor::new(out)))
    }

    fn upsert(&self, record: &MediaRecord) -> EngineResult<i64> {
        let parent = self.find_id(&record.parent_path)?;

        let mut columns = record.columns();
        columns.push((COL_PARENT, parent.into()));

        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let updates = names.iter()
            .filter(|name| **name != COL_DATA)
            .map(|name| format!("{name} = excluded.{name}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {FILES_TABLE} ({}) VALUES ({placeholders}) \
             ON CONFLICT({COL_DATA}) DO UPDATE SET {updates}",
            names.join(", "),
        );

        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(columns.iter().map(|(_, value)| value)))?;
        let id = conn.query_row(
            &format!("SELECT {COL_ID} FROM {FILES_TABLE} WHERE {COL_DATA} = ?1"),
            [&record.path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn remove(&self, path: &str) -> EngineResult<usize> {
        let children = format!("{}/%", escape_like(path.trim_end_matches('/')));
        let conn = self.lock()?;
        let removed = conn.execute(
            &format!(
                "DELETE FROM {FILES_TABLE} WHERE {COL_DATA} = ?1 OR {COL_DATA} LIKE ?2 ESCAPE '\\'"
            ),
            [path, children.as_str()],
        )?;
        Ok(removed)
    }

    fn find_id(&self, path: &str) -> EngineResult<Option<i64>> {
        let conn = self.lock()?;
        let id = conn.query_row(
            &format!("SELECT {COL_ID} FROM {FILES_TABLE} WHERE {COL_DATA} = ?1"),
            [path],
            |row| row.get(0),
        ).optional()?;
        Ok(id)
    }

    fn modified_time(&self, path: &str) -> EngineResult<Option<i64>> {
        let conn = self.lock()?;
        let modified = conn.query_row(
            &format!(
                "SELECT {} FROM {FILES_TABLE} WHERE {COL_DATA} = ?1",
                schema::COL_DATE_MODIFIED
            ),
            [path],
            |row| row.get::<_, Option<i64>>(0),
        ).optional()?;
        Ok(modified.flatten())
    }

    fn count(&self) -> EngineResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {FILES_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AudioTags, COL_TITLE, MEDIA_TYPE_AUDIO, MEDIA_TYPE_NONE};

    fn record(path: &str, parent: &str, media_type: i64) -> MediaRecord {
        MediaRecord {
            path: path.to_string(),
            parent_path: parent.to_string(),
            title: path.rsplit('/').next().unwrap_or_default().to_string(),
            mime_type: None,
            media_type,
            size: 10,
            date_modified: 1_000,
            date_added: 1_000,
            tags: AudioTags::default(),
            width: None,
            height: None,
            orientation: None,
            latitude: None,
            longitude: None,
            description: None,
        }
    }

    #[test]
    fn test_upsert_resolves_parent_and_dedups() {
        let store = SqliteStore::open_in_memory().unwrap();
        let folder = store.upsert(&record("/m/Music", "/m", MEDIA_TYPE_NONE)).unwrap();
        let song = store.upsert(&record("/m/Music/a.mp3", "/m/Music", MEDIA_TYPE_AUDIO)).unwrap();
        let again = store.upsert(&record("/m/Music/a.mp3", "/m/Music", MEDIA_TYPE_AUDIO)).unwrap();

        assert_eq!(song, again);
        assert_eq!(store.count().unwrap(), 2);

        let selection = CompiledPredicate::new("_id = ?", vec![SqlArg::Integer(song)]);
        let columns = [COL_ID, COL_PARENT, COL_TITLE];
        let mut cursor = store.query(&StoreQuery::new(FILES_TABLE, &columns, &selection)).unwrap();
        let row = cursor.next_row().unwrap();
        assert_eq!(row.get_i64(COL_PARENT), Some(folder));
        assert_eq!(row.get_str(COL_TITLE), Some("a.mp3"));
        assert!(cursor.next_row().is_none());
    }

    #[test]
    fn test_query_order_and_page() {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["c", "a", "b", "d"] {
            store.upsert(&record(&format!("/m/{name}.mp3"), "/m", MEDIA_TYPE_AUDIO)).unwrap();
        }
        let selection = CompiledPredicate::new("media_type = ?", vec![SqlArg::Integer(MEDIA_TYPE_AUDIO)]);
        let columns = [COL_TITLE];
        let query = StoreQuery::new(FILES_TABLE, &columns, &selection)
            .order_by(Some("title DESC"))
            .page(2, 1);
        assert!(query.to_sql().ends_with("ORDER BY title DESC LIMIT ? OFFSET ?"));

        let mut cursor = store.query(&query).unwrap();
        let mut titles = Vec::new();
        while let Some(row) = cursor.next_row() {
            titles.push(row.get_str(COL_TITLE).unwrap_or_default().to_string());
        }
        assert_eq!(titles, vec!["c.mp3", "b.mp3"]);
    }

    #[test]
    fn test_remove_takes_children_but_not_siblings() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&record("/m/a_b", "/m", MEDIA_TYPE_NONE)).unwrap();
        store.upsert(&record("/m/a_b/x.mp3", "/m/a_b", MEDIA_TYPE_AUDIO)).unwrap();
        store.upsert(&record("/m/axb/y.mp3", "/m/axb", MEDIA_TYPE_AUDIO)).unwrap();

        assert_eq!(store.remove("/m/a_b").unwrap(), 2);
        assert!(store.find_id("/m/axb/y.mp3").unwrap().is_some());
        assert_eq!(store.modified_time("/m/axb/y.mp3").unwrap(), Some(1_000));
    }

    #[test]
    fn test_closed_cursor_yields_nothing() {
        let mut cursor = RowsCursor::new(vec![Row::new(Arc::from(vec!["x".to_string()]), vec![StoredValue::Integer(1)])]);
        cursor.close();
        assert!(cursor.is_closed());
        assert!(cursor.next_row().is_none());
    }
}
