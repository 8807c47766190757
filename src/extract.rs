// extract.rs - 音频标签提取
//! 按顺序尝试多个标签读取器：ID3v2 优先，ID3v1 补全缺失字段

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::schema::AudioTags;

/// 标签读取器
pub trait TagReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// 文件没有该格式的标签时返回 Ok(None)
    fn read(&self, path: &Path) -> Result<Option<AudioTags>>;
}

/// ID3v1 流派表（0-79 为标准定义）
const ID3V1_GENRES: [&str; 80] = [
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop",
    "Jazz", "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock",
    "Techno", "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack",
    "Euro-Techno", "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance",
    "Classical", "Instrumental", "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise",
    "AlternRock", "Bass", "Soul", "Punk", "Space", "Meditative", "Instrumental Pop",
    "Instrumental Rock", "Ethnic", "Gothic", "Darkwave", "Techno-Industrial", "Electronic",
    "Pop-Folk", "Eurodance", "Dream", "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40",
    "Christian Rap", "Pop/Funk", "Jungle", "Native American", "Cabaret", "New Wave",
    "Psychadelic", "Rave", "Showtunes", "Trailer", "Lo-Fi", "Tribal", "Acid Punk",
    "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll", "Hard Rock",
];

fn genre_name(index: usize) -> Option<String> {
    ID3V1_GENRES.get(index).map(|g| g.to_string())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// ID3v1 / ID3v1.1：文件末尾 128 字节
pub struct Id3v1Reader;

impl TagReader for Id3v1Reader {
    fn name(&self) -> &'static str {
        "id3v1"
    }

    fn read(&self, path: &Path) -> Result<Option<AudioTags>> {
        let mut file = File::open(path)
            .with_context(|| format!("无法打开文件 {}", path.display()))?;
        if file.metadata()?.len() < 128 {
            return Ok(None);
        }
        file.seek(SeekFrom::End(-128))?;
        let mut block = [0u8; 128];
        file.read_exact(&mut block)?;
        Ok(parse_id3v1(&block))
    }
}

fn parse_id3v1(block: &[u8; 128]) -> Option<AudioTags> {
    if &block[0..3] != b"TAG" {
        return None;
    }
    // v1.1: 注释第 29 字节为 0 时，第 30 字节是音轨号
    let track = (block[125] == 0 && block[126] != 0).then(|| block[126] as i64);

    Some(AudioTags {
        title: non_empty(latin1(&block[3..33])),
        artist: non_empty(latin1(&block[33..63])),
        album: non_empty(latin1(&block[63..93])),
        genre: genre_name(block[127] as usize),
        track,
        ..Default::default()
    })
}

/// ID3v2.3 / ID3v2.4：文件开头的标签
pub struct Id3v2Reader;

impl TagReader for Id3v2Reader {
    fn name(&self) -> &'static str {
        "id3v2"
    }

    fn read(&self, path: &Path) -> Result<Option<AudioTags>> {
        let mut file = File::open(path)
            .with_context(|| format!("无法打开文件 {}", path.display()))?;
        let mut header = [0u8; 10];
        if file.read(&mut header)? < 10 || &header[0..3] != b"ID3" {
            return Ok(None);
        }
        let version = header[3];
        if version != 3 && version != 4 {
            debug!("[Tags] 不支持的 ID3v2.{} 标签: {}", version, path.display());
            return Ok(None);
        }
        let size = syncsafe(&header[6..10]);
        // 标签不可能比文件本身还大，按声明的大小分配之前先检查
        let available = file.metadata()?.len().saturating_sub(10);
        if size as u64 > available {
            debug!("[Tags] ID3v2 标签声明 {} 字节，文件只剩 {} 字节: {}", size, available, path.display());
            return Ok(None);
        }
        let mut body = vec![0u8; size];
        file.read_exact(&mut body)
            .with_context(|| format!("ID3v2 标签被截断: {}", path.display()))?;
        Ok(Some(parse_id3v2_frames(version, header[5], &body)))
    }
}

fn syncsafe(bytes: &[u8]) -> usize {
    bytes.iter().fold(0usize, |acc, &b| (acc << 7) | (b & 0x7f) as usize)
}

fn be_u32(bytes: &[u8]) -> usize {
    bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
}

fn parse_id3v2_frames(version: u8, flags: u8, body: &[u8]) -> AudioTags {
    let mut tags = AudioTags::default();
    let mut pos = 0;

    // 扩展头
    if flags & 0x40 != 0 && body.len() >= 4 {
        pos = if version == 4 { syncsafe(&body[0..4]) } else { be_u32(&body[0..4]) + 4 };
    }

    while pos + 10 <= body.len() {
        let id = &body[pos..pos + 4];
        if id[0] == 0 {
            break; // 填充区
        }
        let size = if version == 4 {
            syncsafe(&body[pos + 4..pos + 8])
        } else {
            be_u32(&body[pos + 4..pos + 8])
        };
        let start = pos + 10;
        let end = start.saturating_add(size);
        if end > body.len() {
            break;
        }
        let data = &body[start..end];
        pos = end;

        if id[0] != b'T' {
            continue;
        }
        let Some(text) = decode_text_frame(data) else { continue };
        match id {
            b"TIT2" => tags.title = Some(text),
            b"TPE1" => tags.artist = Some(text),
            b"TPE2" => tags.album_artist = Some(text),
            b"TALB" => tags.album = Some(text),
            b"TCOM" => tags.composer = Some(text),
            b"TCON" => tags.genre = Some(content_type(&text)),
            b"TCOP" => tags.copyright = Some(text),
            b"TRCK" => tags.track = leading_number(&text),
            b"TLEN" => tags.duration_ms = leading_number(&text),
            _ => {}
        }
    }
    tags
}

/// 文本帧：首字节为编码
fn decode_text_frame(data: &[u8]) -> Option<String> {
    let (&encoding, text) = data.split_first()?;
    let decoded = match encoding {
        0 => latin1(text),
        1 => decode_utf16(text, None),
        2 => decode_utf16(text, Some(false)),
        3 => String::from_utf8_lossy(text).into_owned(),
        _ => return None,
    };
    // 多值以 NUL 分隔，取第一个
    non_empty(decoded.split('\0').next().unwrap_or_default().to_string())
}

/// `little_endian` 为 None 时从 BOM 判断
fn decode_utf16(bytes: &[u8], little_endian: Option<bool>) -> String {
    let (little_endian, bytes) = match (little_endian, bytes) {
        (Some(le), _) => (le, bytes),
        (None, [0xff, 0xfe, rest @ ..]) => (true, rest),
        (None, [0xfe, 0xff, rest @ ..]) => (false, rest),
        (None, _) => (false, bytes),
    };
    let units: Vec<u16> = bytes.chunks_exact(2)
        .map(|c| if little_endian {
            u16::from_le_bytes([c[0], c[1]])
        } else {
            u16::from_be_bytes([c[0], c[1]])
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// TCON 可能是 "(17)"、"(17)Rock" 或纯文本
fn content_type(text: &str) -> String {
    if let Some(rest) = text.strip_prefix('(') {
        if let Some((index, tail)) = rest.split_once(')') {
            if !tail.is_empty() {
                return tail.to_string();
            }
            if let Some(name) = index.parse().ok().and_then(genre_name) {
                return name;
            }
        }
    }
    text.parse().ok().and_then(genre_name).unwrap_or_else(|| text.to_string())
}

/// "3/12" -> 3
fn leading_number(text: &str) -> Option<i64> {
    text.split('/').next()?.trim().parse().ok()
}

/// 标签提取器（按顺序组合多个读取器）
pub struct TagExtractor {
    readers: Vec<Box<dyn TagReader>>,
}

impl TagExtractor {
    /// 默认读取链：ID3v2 -> ID3v1
    pub fn new() -> Self {
        Self {
            readers: vec![Box::new(Id3v2Reader), Box::new(Id3v1Reader)],
        }
    }

    pub fn empty() -> Self {
        Self { readers: Vec::new() }
    }

    /// 在读取链末尾追加一个读取器
    pub fn with_reader(mut self, reader: Box<dyn TagReader>) -> Self {
        self.readers.push(reader);
        self
    }

    /// 依次读取，前面读取器的值优先；单个读取器失败只记录日志
    pub fn extract(&self, path: &Path) -> AudioTags {
        let mut tags = AudioTags::default();
        for reader in &self.readers {
            match reader.read(path) {
                Ok(Some(found)) => tags.fill_missing(found),
                Ok(None) => {}
                Err(e) => debug!("[Tags] {} 读取失败 {}: {:#}", reader.name(), path.display(), e),
            }
        }
        tags
    }

    /// 是否支持该文件类型
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
    }
}

impl Default for TagExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn text_frame(id: &[u8; 4], text: &str) -> Vec<u8> {
        let mut frame = id.to_vec();
        frame.extend_from_slice(&((text.len() + 1) as u32).to_be_bytes());
        frame.extend_from_slice(&[0, 0, 3]);
        frame.extend_from_slice(text.as_bytes());
        frame
    }

    fn id3v2_tag(frames: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = frames.concat();
        let size = body.len() + 16; // 末尾留一些填充
        let mut tag = b"ID3\x03\x00\x00".to_vec();
        tag.extend_from_slice(&[
            ((size >> 21) & 0x7f) as u8,
            ((size >> 14) & 0x7f) as u8,
            ((size >> 7) & 0x7f) as u8,
            (size & 0x7f) as u8,
        ]);
        tag.extend_from_slice(&body);
        tag.extend_from_slice(&[0u8; 16]);
        tag
    }

    fn id3v1_block(title: &str, artist: &str, album: &str, track: u8, genre: u8) -> Vec<u8> {
        let mut block = vec![0u8; 128];
        block[0..3].copy_from_slice(b"TAG");
        block[3..3 + title.len()].copy_from_slice(title.as_bytes());
        block[33..33 + artist.len()].copy_from_slice(artist.as_bytes());
        block[63..63 + album.len()].copy_from_slice(album.as_bytes());
        block[126] = track;
        block[127] = genre;
        block
    }

    #[test]
    fn test_id3v2_size_larger_than_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("oversized.mp3");
        let mut bytes = b"ID3\x03\x00\x00\x7f\x7f\x7f\x7f".to_vec();
        bytes.extend_from_slice(&text_frame(b"TIT2", "Short"));
        std::fs::write(&path, &bytes).unwrap();

        assert!(Id3v2Reader.read(&path).unwrap().is_none());
    }

    #[test]
    fn test_id3v2_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        let mut bytes = id3v2_tag(&[
            text_frame(b"TIT2", "So What"),
            text_frame(b"TPE1", "Miles Davis"),
            text_frame(b"TCON", "(8)"),
            text_frame(b"TRCK", "1/5"),
            text_frame(b"TLEN", "562000"),
        ]);
        bytes.extend_from_slice(&[0xffu8; 64]);
        std::fs::write(&path, bytes).unwrap();

        let tags = Id3v2Reader.read(&path).unwrap().unwrap();
        assert_eq!(tags.title.as_deref(), Some("So What"));
        assert_eq!(tags.artist.as_deref(), Some("Miles Davis"));
        assert_eq!(tags.genre.as_deref(), Some("Jazz"));
        assert_eq!(tags.track, Some(1));
        assert_eq!(tags.duration_ms, Some(562_000));
        assert!(Id3v1Reader.read(&path).unwrap().is_none());
    }

    #[test]
    fn test_id3v1_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        let mut bytes = id3v2_tag(&[text_frame(b"TIT2", "Blue in Green")]);
        bytes.extend_from_slice(&[0xffu8; 300]);
        bytes.extend_from_slice(&id3v1_block("Blue in Gr", "Miles Davis", "Kind of Blue", 3, 8));
        std::fs::write(&path, bytes).unwrap();

        let tags = TagExtractor::new().extract(&path);
        // 标题以 v2 为准
        assert_eq!(tags.title.as_deref(), Some("Blue in Green"));
        assert_eq!(tags.artist.as_deref(), Some("Miles Davis"));
        assert_eq!(tags.album.as_deref(), Some("Kind of Blue"));
        assert_eq!(tags.track, Some(3));
        assert_eq!(tags.genre.as_deref(), Some("Jazz"));
    }

    #[test]
    fn test_untagged_file_yields_empty_tags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.mp3");
        std::fs::write(&path, b"plain bytes").unwrap();
        assert!(TagExtractor::new().extract(&path).is_empty());
        // 不存在的文件只记录日志
        assert!(TagExtractor::new().extract(&dir.path().join("gone.mp3")).is_empty());
    }

    struct FixedReader(AudioTags);

    impl TagReader for FixedReader {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn read(&self, _path: &Path) -> Result<Option<AudioTags>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[test]
    fn test_custom_reader_chain() {
        let extractor = TagExtractor::empty()
            .with_reader(Box::new(FixedReader(AudioTags {
                album: Some("First".into()),
                ..Default::default()
            })))
            .with_reader(Box::new(FixedReader(AudioTags {
                album: Some("Second".into()),
                composer: Some("Bill Evans".into()),
                ..Default::default()
            })));
        let tags = extractor.extract(Path::new("anything.mp3"));
        assert_eq!(tags.album.as_deref(), Some("First"));
        assert_eq!(tags.composer.as_deref(), Some("Bill Evans"));
        assert!(extractor.is_supported(Path::new("a.MP3")));
        assert!(!extractor.is_supported(Path::new("a.flac")));
    }

    #[test]
    fn test_utf16_and_content_type() {
        assert_eq!(decode_text_frame(&[1, 0xff, 0xfe, b'H', 0, b'i', 0]).as_deref(), Some("Hi"));
        assert_eq!(content_type("(17)Rock & Roll"), "Rock & Roll");
        assert_eq!(content_type("Ambient"), "Ambient");
        assert_eq!(leading_number("7/12"), Some(7));
    }
}
