// schema/value.rs - 存储值与属性值
//! 存储层的原始单元格值，以及映射后的逻辑属性值

use serde::{Deserialize, Serialize};

/// files 表里的一个单元格
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl StoredValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Real(v) => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 不做任何转换，原样变为属性值；NULL 返回 None
    pub fn to_attribute(&self) -> Option<AttributeValue> {
        match self {
            Self::Null => None,
            Self::Integer(v) => Some(AttributeValue::Integer(*v)),
            Self::Real(v) => Some(AttributeValue::Real(*v)),
            Self::Text(s) => Some(AttributeValue::Text(s.clone())),
        }
    }
}

impl From<i64> for StoredValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for StoredValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for StoredValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<StoredValue>> From<Option<T>> for StoredValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// 地理位置（由 latitude/longitude 两列组合而成）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// 逻辑属性值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Real(f64),
    Text(String),
    TextList(Vec<String>),
    Geolocation(Geolocation),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Real(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_geolocation(&self) -> Option<Geolocation> {
        match self {
            Self::Geolocation(g) => Some(*g),
            _ => None,
        }
    }
}
