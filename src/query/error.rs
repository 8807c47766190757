// query/error.rs - 查询编译错误
//! 过滤器/排序编译期间的错误类型
//!
//! `Configuration` 属于映射表本身的配置错误，应当在启动时由
//! `AttributeMapping::validate` 暴露；其余三种是单次请求的输入错误。

/// 查询编译错误类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),
}

impl QueryError {
    /// 是否是配置类错误（与用户输入无关）
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// 用于 API 错误响应的错误代码
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownAttribute(_) => "UNKNOWN_ATTRIBUTE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::InvalidSort(_) => "INVALID_SORT",
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
