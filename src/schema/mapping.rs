// schema/mapping.rs - 属性映射表
//! 逻辑属性名 -> 存储列 的静态映射
//!
//! 每个属性要么对应一个单列（可带双向转换器），要么对应多个列的组合
//! （需要一个组合函数把多列原始值合成一个属性值）。

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use super::fields::*;
use super::value::{AttributeValue, Geolocation, StoredValue};
use crate::query::error::{QueryError, QueryResult};
use crate::query::types::FilterValue;

/// 存储值 -> 属性值
pub type ToAttributeFn = fn(&StoredValue) -> Option<AttributeValue>;
/// 过滤字面值 -> 存储侧的值；返回 None 表示该字面值无法表示为存储值
pub type ToStorageFn = fn(&FilterValue) -> Option<FilterValue>;
/// 多列原始值 -> 属性值（参数顺序与列声明顺序一致）
pub type CombineFn = fn(&[StoredValue]) -> Option<AttributeValue>;

/// 单列的双向值转换器
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    pub to_attribute: ToAttributeFn,
    pub to_storage: ToStorageFn,
}

/// 列的存储类型，决定能绑定哪类值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
}

impl ColumnKind {
    /// 转换后的存储值能否和该列比较
    pub fn accepts(self, value: &FilterValue) -> bool {
        match self {
            Self::Text => matches!(value, FilterValue::Text(_)),
            Self::Integer | Self::Real => matches!(
                value,
                FilterValue::Integer(_) | FilterValue::Real(_) | FilterValue::Bool(_)
            ),
        }
    }
}

/// 单列映射
#[derive(Debug, Clone)]
pub struct SingleDbField {
    name: &'static str,
    kind: ColumnKind,
    translator: Option<Translator>,
}

impl SingleDbField {
    pub fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, translator: None }
    }

    pub fn with_translator(name: &'static str, kind: ColumnKind, translator: Translator) -> Self {
        Self { name, kind, translator: Some(translator) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// 把读到的原始值转换为属性值
    pub fn to_attribute(&self, raw: &StoredValue) -> Option<AttributeValue> {
        match self.translator {
            Some(t) => (t.to_attribute)(raw),
            None => raw.to_attribute(),
        }
    }

    /// 把过滤字面值转换为要绑定的存储值
    pub fn to_storage(&self, value: &FilterValue) -> Option<FilterValue> {
        match self.translator {
            Some(t) => (t.to_storage)(value),
            None => Some(value.clone()),
        }
    }
}

/// 多列组合映射
#[derive(Debug, Clone)]
pub struct CompositeDbField {
    fields: Vec<SingleDbField>,
    combiner: Option<CombineFn>,
}

impl CompositeDbField {
    pub fn fields(&self) -> &[SingleDbField] {
        &self.fields
    }

    pub fn combiner(&self) -> Option<CombineFn> {
        self.combiner
    }
}

/// 一个属性的映射
#[derive(Debug, Clone)]
pub enum DbField {
    Single(SingleDbField),
    Composite(CompositeDbField),
}

impl DbField {
    /// 该属性涉及的所有存储列
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Self::Single(f) => vec![f.name()],
            Self::Composite(c) => c.fields.iter().map(|f| f.name()).collect(),
        }
    }
}

/// 映射后的一行：属性名 -> 属性值（值为空的属性不出现）
pub type ValueSet = BTreeMap<String, AttributeValue>;

/// 属性映射表
#[derive(Debug, Clone, Default)]
pub struct AttributeMapping {
    fields: BTreeMap<&'static str, DbField>,
}

/// 映射表构建器
#[derive(Debug, Default)]
pub struct MappingBuilder {
    fields: BTreeMap<&'static str, DbField>,
}

impl MappingBuilder {
    pub fn single(mut self, attribute: &'static str, column: &'static str, kind: ColumnKind) -> Self {
        self.fields.insert(attribute, DbField::Single(SingleDbField::new(column, kind)));
        self
    }

    pub fn translated(
        mut self,
        attribute: &'static str,
        column: &'static str,
        kind: ColumnKind,
        translator: Translator,
    ) -> Self {
        self.fields.insert(
            attribute,
            DbField::Single(SingleDbField::with_translator(column, kind, translator)),
        );
        self
    }

    pub fn composite(
        mut self,
        attribute: &'static str,
        columns: &[(&'static str, ColumnKind)],
        combiner: Option<CombineFn>,
    ) -> Self {
        let fields = columns.iter().map(|(c, kind)| SingleDbField::new(*c, *kind)).collect();
        self.fields.insert(attribute, DbField::Composite(CompositeDbField { fields, combiner }));
        self
    }

    pub fn build(self) -> AttributeMapping {
        AttributeMapping { fields: self.fields }
    }
}

impl AttributeMapping {
    pub fn builder() -> MappingBuilder {
        MappingBuilder::default()
    }

    /// 媒体库的标准映射表
    pub fn standard() -> Self {
        use ColumnKind::*;

        Self::builder()
            .single("id", COL_ID, Integer)
            .translated("type", COL_MEDIA_TYPE, Integer, MEDIA_TYPE_TRANSLATOR)
            .single("mimeType", COL_MIME_TYPE, Text)
            .single("title", COL_TITLE, Text)
            .single("itemURI", COL_DATA, Text)
            .single("folderId", COL_PARENT, Integer)
            .translated("modifiedDate", COL_DATE_MODIFIED, Integer, DATE_TRANSLATOR)
            .translated("addedDate", COL_DATE_ADDED, Integer, DATE_TRANSLATOR)
            .single("size", COL_SIZE, Integer)
            .single("description", COL_DESCRIPTION, Text)
            .single("album", COL_ALBUM, Text)
            .composite(
                "artists",
                &[(COL_ARTIST, Text), (COL_ALBUM_ARTIST, Text)],
                Some(combine_artists),
            )
            .translated("genres", COL_GENRE, Text, LIST_TRANSLATOR)
            .translated("composers", COL_COMPOSER, Text, LIST_TRANSLATOR)
            .single("copyright", COL_COPYRIGHT, Text)
            .single("trackNumber", COL_TRACK, Integer)
            .single("duration", COL_DURATION, Integer)
            .single("width", COL_WIDTH, Integer)
            .single("height", COL_HEIGHT, Integer)
            .single("orientation", COL_ORIENTATION, Integer)
            .composite(
                "geolocation",
                &[(COL_LATITUDE, Real), (COL_LONGITUDE, Real)],
                Some(combine_geolocation),
            )
            .build()
    }

    /// 启动时的配置校验：组合属性必须有组合函数且至少有一列
    pub fn validate(&self) -> QueryResult<()> {
        for (attribute, field) in &self.fields {
            if let DbField::Composite(composite) = field {
                if composite.fields.is_empty() {
                    return Err(QueryError::Configuration(format!(
                        "composite attribute '{attribute}' declares no columns"
                    )));
                }
                if composite.combiner.is_none() {
                    return Err(QueryError::Configuration(format!(
                        "composite attribute '{attribute}' has no combiner"
                    )));
                }
            }
        }
        Ok(())
    }

    /// 查找属性的映射
    pub fn resolve(&self, attribute: &str) -> QueryResult<&DbField> {
        self.fields
            .get(attribute)
            .ok_or_else(|| QueryError::UnknownAttribute(attribute.to_string()))
    }

    pub fn attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// 查询时需要的全部存储列（去重，`_id` 总在第一位）
    pub fn projection(&self) -> Vec<&'static str> {
        let mut columns = vec![COL_ID];
        for field in self.fields.values() {
            for column in field.columns() {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        columns
    }

    /// 对组合属性调用组合函数
    pub fn combine(&self, attribute: &str, raw: &[StoredValue]) -> QueryResult<Option<AttributeValue>> {
        match self.resolve(attribute)? {
            DbField::Composite(composite) => {
                let combiner = composite.combiner.ok_or_else(|| {
                    QueryError::Configuration(format!(
                        "composite attribute '{attribute}' has no combiner"
                    ))
                })?;
                Ok(combiner(raw))
            }
            DbField::Single(field) => Ok(raw.first().and_then(|v| field.to_attribute(v))),
        }
    }

    /// 把一行存储值映射为属性集合
    ///
    /// `lookup` 按列名返回该行的原始值，缺列视为 NULL。
    pub fn read_row<'r, F>(&self, lookup: F) -> QueryResult<ValueSet>
    where
        F: Fn(&str) -> Option<&'r StoredValue>,
    {
        let mut values = ValueSet::new();
        for (attribute, field) in &self.fields {
            let value = match field {
                DbField::Single(single) => {
                    lookup(single.name()).and_then(|raw| single.to_attribute(raw))
                }
                DbField::Composite(composite) => {
                    let raw: Vec<StoredValue> = composite
                        .fields
                        .iter()
                        .map(|f| lookup(f.name()).cloned().unwrap_or_default())
                        .collect();
                    self.combine(attribute, &raw)?
                }
            };
            if let Some(value) = value {
                values.insert(attribute.to_string(), value);
            }
        }
        Ok(values)
    }
}

/// 进程内共享的只读映射表
pub static MAPPING: Lazy<AttributeMapping> = Lazy::new(AttributeMapping::standard);

// ============== 转换器与组合函数 ==============

const MEDIA_TYPE_TRANSLATOR: Translator = Translator {
    to_attribute: media_type_to_attribute,
    to_storage: media_type_to_storage,
};

const DATE_TRANSLATOR: Translator = Translator {
    to_attribute: seconds_to_millis,
    to_storage: millis_to_seconds,
};

const LIST_TRANSLATOR: Translator = Translator {
    to_attribute: text_to_list,
    to_storage: identity,
};

pub fn media_type_name(media_type: i64) -> &'static str {
    match media_type {
        MEDIA_TYPE_IMAGE => "IMAGE",
        MEDIA_TYPE_AUDIO => "AUDIO",
        MEDIA_TYPE_VIDEO => "VIDEO",
        _ => "UNKNOWN",
    }
}

fn media_type_to_attribute(raw: &StoredValue) -> Option<AttributeValue> {
    raw.as_i64().map(|t| AttributeValue::Text(media_type_name(t).to_string()))
}

fn media_type_to_storage(value: &FilterValue) -> Option<FilterValue> {
    let media_type = match value.as_str()?.to_ascii_uppercase().as_str() {
        "IMAGE" => MEDIA_TYPE_IMAGE,
        "AUDIO" => MEDIA_TYPE_AUDIO,
        "VIDEO" => MEDIA_TYPE_VIDEO,
        _ => return None,
    };
    Some(FilterValue::Integer(media_type))
}

// 存储里是秒，属性是毫秒
fn seconds_to_millis(raw: &StoredValue) -> Option<AttributeValue> {
    raw.as_i64().map(|secs| AttributeValue::Integer(secs * 1000))
}

// 不足整秒的毫秒值绑定为 REAL 秒数，SQLite 按数值比较整数列，
// 因此 < / > / 范围 / 相等 都与读出的毫秒值一致
fn millis_to_seconds(value: &FilterValue) -> Option<FilterValue> {
    match value {
        FilterValue::Integer(ms) if ms % 1000 == 0 => Some(FilterValue::Integer(ms / 1000)),
        FilterValue::Integer(ms) => Some(FilterValue::Real(*ms as f64 / 1000.0)),
        FilterValue::Real(ms) if ms.is_finite() => {
            let secs = ms / 1000.0;
            if secs.fract() == 0.0 {
                Some(FilterValue::Integer(secs as i64))
            } else {
                Some(FilterValue::Real(secs))
            }
        }
        _ => None,
    }
}

fn text_to_list(raw: &StoredValue) -> Option<AttributeValue> {
    raw.as_str().map(|s| AttributeValue::TextList(vec![s.to_string()]))
}

fn identity(value: &FilterValue) -> Option<FilterValue> {
    Some(value.clone())
}

fn combine_artists(raw: &[StoredValue]) -> Option<AttributeValue> {
    let mut artists: Vec<String> = Vec::new();
    for name in raw.iter().filter_map(|v| v.as_str()) {
        if !name.is_empty() && !artists.iter().any(|a| a == name) {
            artists.push(name.to_string());
        }
    }
    if artists.is_empty() {
        None
    } else {
        Some(AttributeValue::TextList(artists))
    }
}

fn combine_geolocation(raw: &[StoredValue]) -> Option<AttributeValue> {
    let latitude = raw.first()?.as_f64()?;
    let longitude = raw.get(1)?.as_f64()?;
    Some(AttributeValue::Geolocation(Geolocation { latitude, longitude }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_standard_mapping_is_valid() {
        assert!(AttributeMapping::standard().validate().is_ok());
    }

    #[test]
    fn test_resolve_distinguishes_single_and_composite() {
        let mapping = AttributeMapping::standard();
        assert!(matches!(mapping.resolve("title"), Ok(DbField::Single(f)) if f.name() == COL_TITLE));
        assert!(matches!(mapping.resolve("artists"), Ok(DbField::Composite(c)) if c.fields().len() == 2));
        assert_eq!(
            mapping.resolve("rating").unwrap_err(),
            QueryError::UnknownAttribute("rating".to_string())
        );
    }

    #[test]
    fn test_missing_combiner_is_configuration_error() {
        let mapping = AttributeMapping::builder()
            .single("title", COL_TITLE, ColumnKind::Text)
            .composite(
                "artists",
                &[(COL_ARTIST, ColumnKind::Text), (COL_ALBUM_ARTIST, ColumnKind::Text)],
                None,
            )
            .build();

        let err = mapping.validate().unwrap_err();
        assert!(err.is_configuration());

        let err = mapping
            .combine("artists", &[StoredValue::from("a"), StoredValue::from("b")])
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_projection_is_distinct() {
        let projection = AttributeMapping::standard().projection();
        assert_eq!(projection[0], COL_ID);
        assert!(projection.contains(&COL_ARTIST));
        assert!(projection.contains(&COL_ALBUM_ARTIST));
        assert_eq!(projection.iter().filter(|c| **c == COL_ID).count(), 1);
    }

    #[test]
    fn test_read_row_applies_translators_and_combiners() {
        let row: HashMap<&str, StoredValue> = HashMap::from([
            (COL_ID, StoredValue::Integer(5)),
            (COL_MEDIA_TYPE, StoredValue::Integer(MEDIA_TYPE_AUDIO)),
            (COL_DATE_MODIFIED, StoredValue::Integer(1_700_000_000)),
            (COL_ARTIST, StoredValue::from("Nina")),
            (COL_ALBUM_ARTIST, StoredValue::from("Various")),
            (COL_GENRE, StoredValue::from("Jazz")),
            (COL_LATITUDE, StoredValue::Null),
            (COL_LONGITUDE, StoredValue::Real(2.35)),
        ]);

        let values = AttributeMapping::standard()
            .read_row(|column| row.get(column))
            .unwrap();

        assert_eq!(values["type"], AttributeValue::Text("AUDIO".into()));
        assert_eq!(values["modifiedDate"], AttributeValue::Integer(1_700_000_000_000));
        assert_eq!(
            values["artists"],
            AttributeValue::TextList(vec!["Nina".into(), "Various".into()])
        );
        assert_eq!(values["genres"], AttributeValue::TextList(vec!["Jazz".into()]));
        // 只有一半坐标时不生成 geolocation
        assert!(!values.contains_key("geolocation"));
        assert!(!values.contains_key("title"));
    }

    #[test]
    fn test_media_type_translator_round_trip() {
        assert_eq!(
            media_type_to_storage(&FilterValue::from("video")),
            Some(FilterValue::Integer(MEDIA_TYPE_VIDEO))
        );
        assert_eq!(media_type_to_storage(&FilterValue::from("folder")), None);
        assert_eq!(media_type_to_storage(&FilterValue::Integer(2)), None);
    }
}
