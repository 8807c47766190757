// engine/item.rs - 媒体条目
//! 把映射后的属性集合组装成带类型的音频/视频/图片条目

use serde::Serialize;

use crate::schema::{AttributeValue, AudioTags, Geolocation, ValueSet};

/// 标签缺失时的占位值
pub const UNKNOWN: &str = "Unknown";

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Audio,
    Video,
    Image,
}

impl MediaType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AUDIO" => Some(Self::Audio),
            "VIDEO" => Some(Self::Video),
            "IMAGE" => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDetails {
    pub album: Option<String>,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub composers: Vec<String>,
    pub copyright: Option<String>,
    pub track_number: Option<i64>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub album: Option<String>,
    pub artists: Vec<String>,
    pub duration: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub geolocation: Option<Geolocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetails {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub orientation: Option<i64>,
    pub geolocation: Option<Geolocation>,
}

/// 各类型特有的字段
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MediaDetails {
    Audio(AudioDetails),
    Video(VideoDetails),
    Image(ImageDetails),
}

/// 一个媒体条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub mime_type: Option<String>,
    pub title: String,
    #[serde(rename = "itemURI")]
    pub item_uri: String,
    pub folder_id: Option<i64>,
    /// 毫秒
    pub modified_date: Option<i64>,
    pub added_date: Option<i64>,
    pub size: Option<i64>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub details: MediaDetails,
}

struct Values<'a>(&'a ValueSet);

impl Values<'_> {
    fn text(&self, attribute: &str) -> Option<String> {
        self.0.get(attribute).and_then(AttributeValue::as_str).map(str::to_string)
    }

    fn int(&self, attribute: &str) -> Option<i64> {
        self.0.get(attribute).and_then(AttributeValue::as_i64)
    }

    fn list(&self, attribute: &str) -> Vec<String> {
        self.0.get(attribute)
            .and_then(AttributeValue::as_list)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    fn geolocation(&self) -> Option<Geolocation> {
        self.0.get("geolocation").and_then(AttributeValue::as_geolocation)
    }
}

impl MediaItem {
    /// 从一行的属性集合构建；缺少 id/itemURI/type 或类型不是媒体时返回 None
    pub fn from_values(values: &ValueSet) -> Option<Self> {
        let v = Values(values);
        let media_type = MediaType::from_name(&v.text("type")?)?;

        let details = match media_type {
            MediaType::Audio => MediaDetails::Audio(AudioDetails {
                album: v.text("album"),
                artists: v.list("artists"),
                genres: v.list("genres"),
                composers: v.list("composers"),
                copyright: v.text("copyright"),
                track_number: v.int("trackNumber"),
                duration: v.int("duration"),
            }),
            MediaType::Video => MediaDetails::Video(VideoDetails {
                album: v.text("album"),
                artists: v.list("artists"),
                duration: v.int("duration"),
                width: v.int("width"),
                height: v.int("height"),
                geolocation: v.geolocation(),
            }),
            MediaType::Image => MediaDetails::Image(ImageDetails {
                width: v.int("width"),
                height: v.int("height"),
                orientation: v.int("orientation"),
                geolocation: v.geolocation(),
            }),
        };

        Some(Self {
            id: v.int("id")?,
            media_type,
            mime_type: v.text("mimeType"),
            title: v.text("title").unwrap_or_default(),
            item_uri: v.text("itemURI")?,
            folder_id: v.int("folderId"),
            modified_date: v.int("modifiedDate"),
            added_date: v.int("addedDate"),
            size: v.int("size"),
            description: v.text("description"),
            details,
        })
    }

    /// 音频条目是否缺少需要从文件标签补全的字段
    pub fn needs_tags(&self) -> bool {
        match &self.details {
            MediaDetails::Audio(audio) => {
                audio.album.is_none() || audio.artists.is_empty() || audio.genres.is_empty()
            }
            _ => false,
        }
    }

    /// 用文件标签补全缺失字段（已有值优先）
    pub fn enrich(&mut self, tags: &AudioTags) {
        let MediaDetails::Audio(audio) = &mut self.details else { return };
        if audio.album.is_none() {
            audio.album = tags.album.clone();
        }
        if audio.artists.is_empty() {
            audio.artists = tags.artist.iter()
                .chain(tags.album_artist.iter())
                .cloned()
                .collect();
            audio.artists.dedup();
        }
        if audio.genres.is_empty() {
            audio.genres = tags.genre.iter().cloned().collect();
        }
        if audio.composers.is_empty() {
            audio.composers = tags.composer.iter().cloned().collect();
        }
        if audio.copyright.is_none() {
            audio.copyright = tags.copyright.clone();
        }
        if audio.track_number.is_none() {
            audio.track_number = tags.track;
        }
        if audio.duration.is_none() {
            audio.duration = tags.duration_ms;
        }
    }

    /// 专辑/艺术家/流派仍为空时填入 "Unknown"
    pub fn fill_unknown(&mut self) {
        let unknown = || vec![UNKNOWN.to_string()];
        match &mut self.details {
            MediaDetails::Audio(audio) => {
                audio.album.get_or_insert_with(|| UNKNOWN.to_string());
                if audio.artists.is_empty() {
                    audio.artists = unknown();
                }
                if audio.genres.is_empty() {
                    audio.genres = unknown();
                }
            }
            MediaDetails::Video(video) => {
                video.album.get_or_insert_with(|| UNKNOWN.to_string());
                if video.artists.is_empty() {
                    video.artists = unknown();
                }
            }
            MediaDetails::Image(_) => {}
        }
    }
}

/// findItems 的结果：按类型分组
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaItemCollection {
    pub audios: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
    pub images: Vec<MediaItem>,
    pub size: usize,
}

impl MediaItemCollection {
    pub fn push(&mut self, item: MediaItem) {
        match item.media_type {
            MediaType::Audio => self.audios.push(item),
            MediaType::Video => self.videos.push(item),
            MediaType::Image => self.images.push(item),
        }
        self.size += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// 按类型顺序遍历所有条目
    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.audios.iter().chain(&self.videos).chain(&self.images)
    }
}

/// 存储卷类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageType {
    Internal,
    External,
}

impl StorageType {
    /// 卷名只接受 "internal" / "external"
    pub fn from_volume(volume: &str) -> Option<Self> {
        match volume {
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

/// 一个媒体目录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFolder {
    pub id: i64,
    #[serde(rename = "folderURI")]
    pub folder_uri: String,
    pub title: String,
    pub storage_type: StorageType,
    pub modified_date: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_values() -> ValueSet {
        let mut values = ValueSet::new();
        values.insert("id".into(), AttributeValue::Integer(9));
        values.insert("type".into(), AttributeValue::Text("AUDIO".into()));
        values.insert("title".into(), AttributeValue::Text("So What".into()));
        values.insert("itemURI".into(), AttributeValue::Text("/m/so_what.mp3".into()));
        values.insert("artists".into(), AttributeValue::TextList(vec!["Miles Davis".into()]));
        values.insert("modifiedDate".into(), AttributeValue::Integer(5_000));
        values
    }

    #[test]
    fn test_from_values_builds_audio() {
        let item = MediaItem::from_values(&audio_values()).unwrap();
        assert_eq!(item.id, 9);
        assert_eq!(item.media_type, MediaType::Audio);
        assert_eq!(item.modified_date, Some(5_000));
        assert!(item.needs_tags());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "AUDIO");
        assert_eq!(json["itemURI"], "/m/so_what.mp3");
        assert_eq!(json["artists"][0], "Miles Davis");
    }

    #[test]
    fn test_missing_required_attribute() {
        let mut values = audio_values();
        values.remove("itemURI");
        assert!(MediaItem::from_values(&values).is_none());

        let mut values = audio_values();
        values.insert("type".into(), AttributeValue::Text("UNKNOWN".into()));
        assert!(MediaItem::from_values(&values).is_none());
    }

    #[test]
    fn test_enrich_then_unknown_defaults() {
        let mut item = MediaItem::from_values(&audio_values()).unwrap();
        item.enrich(&AudioTags {
            artist: Some("Someone Else".into()),
            genre: Some("Jazz".into()),
            ..Default::default()
        });
        item.fill_unknown();

        let MediaDetails::Audio(audio) = &item.details else { panic!("not audio") };
        assert_eq!(audio.artists, vec!["Miles Davis"]);
        assert_eq!(audio.genres, vec!["Jazz"]);
        assert_eq!(audio.album.as_deref(), Some(UNKNOWN));
    }

    #[test]
    fn test_collection_groups_by_type() {
        let mut collection = MediaItemCollection::default();
        let audio = MediaItem::from_values(&audio_values()).unwrap();
        let mut image_values = audio_values();
        image_values.insert("type".into(), AttributeValue::Text("IMAGE".into()));
        let image = MediaItem::from_values(&image_values).unwrap();

        collection.push(audio);
        collection.push(image);
        assert_eq!(collection.size, 2);
        assert_eq!(collection.audios.len(), 1);
        assert_eq!(collection.images.len(), 1);
        assert_eq!(collection.iter().count(), 2);
        assert_eq!(StorageType::from_volume("sdcard"), None);
    }
}
