// schema/document.rs - 索引记录结构定义
//! 扫描时写入 files 表的一行

use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::fields::*;
use super::value::StoredValue;

/// 按扩展名识别媒体类型，返回 (media_type, mime_type)
pub fn classify_extension(extension: &str) -> Option<(i64, &'static str)> {
    let kind = match extension.to_ascii_lowercase().as_str() {
        "mp3" => (MEDIA_TYPE_AUDIO, "audio/mpeg"),
        "ogg" | "oga" => (MEDIA_TYPE_AUDIO, "audio/ogg"),
        "flac" => (MEDIA_TYPE_AUDIO, "audio/flac"),
        "wav" => (MEDIA_TYPE_AUDIO, "audio/x-wav"),
        "m4a" | "aac" => (MEDIA_TYPE_AUDIO, "audio/mp4"),
        "mp4" | "m4v" => (MEDIA_TYPE_VIDEO, "video/mp4"),
        "3gp" => (MEDIA_TYPE_VIDEO, "video/3gpp"),
        "webm" => (MEDIA_TYPE_VIDEO, "video/webm"),
        "mkv" => (MEDIA_TYPE_VIDEO, "video/x-matroska"),
        "avi" => (MEDIA_TYPE_VIDEO, "video/x-msvideo"),
        "jpg" | "jpeg" => (MEDIA_TYPE_IMAGE, "image/jpeg"),
        "png" => (MEDIA_TYPE_IMAGE, "image/png"),
        "gif" => (MEDIA_TYPE_IMAGE, "image/gif"),
        "bmp" => (MEDIA_TYPE_IMAGE, "image/bmp"),
        "webp" => (MEDIA_TYPE_IMAGE, "image/webp"),
        _ => return None,
    };
    Some(kind)
}

/// 音频标签（来自 ID3 等标签读取器）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub copyright: Option<String>,
    pub track: Option<i64>,
    pub duration_ms: Option<i64>,
}

impl AudioTags {
    /// 用 `other` 补全自己缺失的字段（已有的值优先）
    pub fn fill_missing(&mut self, other: AudioTags) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.title, other.title);
        fill(&mut self.artist, other.artist);
        fill(&mut self.album_artist, other.album_artist);
        fill(&mut self.album, other.album);
        fill(&mut self.composer, other.composer);
        fill(&mut self.genre, other.genre);
        fill(&mut self.copyright, other.copyright);
        fill(&mut self.track, other.track);
        fill(&mut self.duration_ms, other.duration_ms);
    }

    pub fn is_empty(&self) -> bool {
        *self == AudioTags::default()
    }
}

/// files 表中的一条记录（文件或目录）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    /// 完整路径
    pub path: String,
    /// 父目录路径（写入时解析为 parent 行 ID）
    pub parent_path: String,
    pub title: String,
    pub mime_type: Option<String>,
    pub media_type: i64,
    pub size: u64,
    /// 修改时间（Unix 时间戳秒）
    pub date_modified: u64,
    /// 加入索引的时间（Unix 时间戳秒）
    pub date_added: u64,
    pub tags: AudioTags,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub orientation: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
}

fn unix_secs(time: std::io::Result<SystemTime>) -> u64 {
    time.unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl MediaRecord {
    /// 从文件路径提取记录；不是可识别的媒体文件时返回 Ok(None)
    pub fn from_path(path: &Path) -> std::io::Result<Option<Self>> {
        let metadata = std::fs::metadata(path)?;
        if metadata.is_dir() {
            return Self::folder(path).map(Some);
        }

        let extension = path.extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some((media_type, mime_type)) = classify_extension(&extension) else {
            return Ok(None);
        };

        let mut record = Self::base(path, &metadata)?;
        record.media_type = media_type;
        record.mime_type = Some(mime_type.to_string());
        record.title = path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Some(record))
    }

    /// 目录记录（media_type = NONE）
    pub fn folder(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let mut record = Self::base(path, &metadata)?;
        record.title = path.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        record.size = 0;
        Ok(record)
    }

    fn base(path: &Path, metadata: &std::fs::Metadata) -> std::io::Result<Self> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let parent_path = canonical.parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            path: canonical.to_string_lossy().to_string(),
            parent_path,
            title: String::new(),
            mime_type: None,
            media_type: MEDIA_TYPE_NONE,
            size: metadata.len(),
            date_modified: unix_secs(metadata.modified()),
            date_added: unix_secs(Ok(SystemTime::now())),
            tags: AudioTags::default(),
            width: None,
            height: None,
            orientation: None,
            latitude: None,
            longitude: None,
            description: None,
        })
    }

    pub fn is_folder(&self) -> bool {
        self.media_type == MEDIA_TYPE_NONE
    }

    /// 合并标签：标签里的标题优先于文件名
    pub fn apply_tags(&mut self, tags: AudioTags) {
        if let Some(title) = tags.title.as_ref().filter(|t| !t.is_empty()) {
            self.title = title.clone();
        }
        self.tags = tags;
    }

    /// 写入时的 (列名, 值) 列表；不含 `_id` 和 `parent`
    pub fn columns(&self) -> Vec<(&'static str, StoredValue)> {
        vec![
            (COL_DATA, self.path.clone().into()),
            (COL_TITLE, self.title.clone().into()),
            (COL_MIME_TYPE, self.mime_type.clone().into()),
            (COL_MEDIA_TYPE, self.media_type.into()),
            (COL_SIZE, (self.size as i64).into()),
            (COL_DATE_MODIFIED, (self.date_modified as i64).into()),
            (COL_DATE_ADDED, (self.date_added as i64).into()),
            (COL_DURATION, self.tags.duration_ms.into()),
            (COL_ARTIST, self.tags.artist.clone().into()),
            (COL_ALBUM_ARTIST, self.tags.album_artist.clone().into()),
            (COL_ALBUM, self.tags.album.clone().into()),
            (COL_COMPOSER, self.tags.composer.clone().into()),
            (COL_GENRE, self.tags.genre.clone().into()),
            (COL_COPYRIGHT, self.tags.copyright.clone().into()),
            (COL_TRACK, self.tags.track.into()),
            (COL_WIDTH, self.width.into()),
            (COL_HEIGHT, self.height.into()),
            (COL_ORIENTATION, self.orientation.into()),
            (COL_LATITUDE, self.latitude.into()),
            (COL_LONGITUDE, self.longitude.into()),
            (COL_DESCRIPTION, self.description.clone().into()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_classify_extension() {
        assert_eq!(classify_extension("MP3"), Some((MEDIA_TYPE_AUDIO, "audio/mpeg")));
        assert_eq!(classify_extension("jpeg").map(|k| k.0), Some(MEDIA_TYPE_IMAGE));
        assert_eq!(classify_extension("txt"), None);
    }

    #[test]
    fn test_record_from_path() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("track01.mp3");
        std::fs::write(&song, b"not really audio").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let record = MediaRecord::from_path(&song).unwrap().unwrap();
        assert_eq!(record.title, "track01");
        assert_eq!(record.media_type, MEDIA_TYPE_AUDIO);
        assert_eq!(record.size, 16);
        assert!(!record.is_folder());

        assert!(MediaRecord::from_path(&dir.path().join("notes.txt")).unwrap().is_none());
        assert!(MediaRecord::from_path(dir.path()).unwrap().unwrap().is_folder());
    }

    #[test]
    fn test_fill_missing_keeps_existing() {
        let mut tags = AudioTags { album: Some("A".into()), ..Default::default() };
        tags.fill_missing(AudioTags {
            album: Some("B".into()),
            genre: Some("Rock".into()),
            ..Default::default()
        });
        assert_eq!(tags.album.as_deref(), Some("A"));
        assert_eq!(tags.genre.as_deref(), Some("Rock"));
    }
}
