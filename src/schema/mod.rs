// schema/mod.rs - Schema 定义模块
//! 定义 files 表结构、属性映射表和记录类型

mod document;
pub mod fields;
pub mod mapping;
pub mod value;

pub use document::*;
pub use fields::*;
pub use mapping::*;
pub use value::*;

/// files 表的建表语句
/// 列布局与平台的媒体索引一致，便于映射表直接引用列名
pub fn build_schema() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {FILES_TABLE} (
            {COL_ID} INTEGER PRIMARY KEY AUTOINCREMENT,
            {COL_DATA} TEXT NOT NULL UNIQUE,
            {COL_TITLE} TEXT,
            {COL_MIME_TYPE} TEXT,
            {COL_MEDIA_TYPE} INTEGER NOT NULL DEFAULT {MEDIA_TYPE_NONE},
            {COL_PARENT} INTEGER,
            {COL_DATE_ADDED} INTEGER,
            {COL_DATE_MODIFIED} INTEGER,
            {COL_SIZE} INTEGER,
            {COL_DURATION} INTEGER,
            {COL_ARTIST} TEXT,
            {COL_ALBUM_ARTIST} TEXT,
            {COL_ALBUM} TEXT,
            {COL_COMPOSER} TEXT,
            {COL_GENRE} TEXT,
            {COL_COPYRIGHT} TEXT,
            {COL_TRACK} INTEGER,
            {COL_WIDTH} INTEGER,
            {COL_HEIGHT} INTEGER,
            {COL_ORIENTATION} INTEGER,
            {COL_LATITUDE} REAL,
            {COL_LONGITUDE} REAL,
            {COL_DESCRIPTION} TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{FILES_TABLE}_parent ON {FILES_TABLE} ({COL_PARENT});
        CREATE INDEX IF NOT EXISTS idx_{FILES_TABLE}_media_type ON {FILES_TABLE} ({COL_MEDIA_TYPE});"
    )
}
