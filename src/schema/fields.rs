// schema/fields.rs - 存储列名常量定义
//! 统一管理 files 表的列名，避免魔法字符串

/// 媒体索引表名
pub const FILES_TABLE: &str = "files";

/// 行 ID
pub const COL_ID: &str = "_id";
/// 文件绝对路径
pub const COL_DATA: &str = "_data";
/// 标题
pub const COL_TITLE: &str = "title";
/// MIME 类型
pub const COL_MIME_TYPE: &str = "mime_type";
/// 媒体类型 (见 MEDIA_TYPE_*)
pub const COL_MEDIA_TYPE: &str = "media_type";
/// 父目录行 ID
pub const COL_PARENT: &str = "parent";
/// 加入索引的时间（Unix 时间戳秒）
pub const COL_DATE_ADDED: &str = "date_added";
/// 修改时间（Unix 时间戳秒）
pub const COL_DATE_MODIFIED: &str = "date_modified";
/// 文件大小（字节）
pub const COL_SIZE: &str = "_size";
/// 时长（毫秒）
pub const COL_DURATION: &str = "duration";
pub const COL_ARTIST: &str = "artist";
pub const COL_ALBUM_ARTIST: &str = "album_artist";
pub const COL_ALBUM: &str = "album";
pub const COL_COMPOSER: &str = "composer";
pub const COL_GENRE: &str = "genre";
pub const COL_COPYRIGHT: &str = "copyright";
/// 音轨号
pub const COL_TRACK: &str = "track";
pub const COL_WIDTH: &str = "width";
pub const COL_HEIGHT: &str = "height";
/// 图片旋转角度 (0/90/180/270)
pub const COL_ORIENTATION: &str = "orientation";
pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";
pub const COL_DESCRIPTION: &str = "description";

// media_type 列的取值
pub const MEDIA_TYPE_NONE: i64 = 0;
pub const MEDIA_TYPE_IMAGE: i64 = 1;
pub const MEDIA_TYPE_AUDIO: i64 = 2;
pub const MEDIA_TYPE_VIDEO: i64 = 3;
