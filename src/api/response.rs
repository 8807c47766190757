// api/response.rs - 查询响应类型
//! 定义 findItems / getFolders / 索引请求的结构化响应类型

use serde::Serialize;

use crate::engine::{EngineError, MediaFolder, MediaItemCollection};
use crate::indexer::ScanStats;
use crate::query::SqlArg;

/// findItems 响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindItemsResponse {
    /// 实际执行的查询
    pub query: QueryInfo,

    /// 按类型分组的结果
    pub items: MediaItemCollection,

    /// 分页信息
    pub pagination: Pagination,

    /// 查询耗时（毫秒）
    pub took_ms: u64,
}

impl FindItemsResponse {
    pub fn new(query: QueryInfo, items: MediaItemCollection) -> Self {
        Self {
            pagination: Pagination {
                offset: 0,
                count: items.size,
                has_more: false,
            },
            query,
            items,
            took_ms: 0,
        }
    }

    /// 结果填满了一页时认为可能还有更多
    pub fn with_pagination(mut self, offset: usize, count: usize) -> Self {
        self.pagination = Pagination {
            offset,
            count,
            has_more: count > 0 && self.items.size >= count,
        };
        self
    }

    pub fn with_took(mut self, took_ms: u64) -> Self {
        self.took_ms = took_ms;
        self
    }
}

/// 编译后的查询（用于调试和展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInfo {
    /// WHERE 模板
    pub selection: String,

    /// 按位置绑定的参数
    pub args: Vec<SqlArg>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

/// 分页信息
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub offset: usize,
    pub count: usize,
    pub has_more: bool,
}

/// getFolders 响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldersResponse {
    pub folders: Vec<MediaFolder>,
    pub took_ms: u64,
}

impl FoldersResponse {
    pub fn new(folders: Vec<MediaFolder>, took_ms: u64) -> Self {
        Self { folders, took_ms }
    }
}

/// 索引响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    /// 是否成功
    pub success: bool,

    /// 消息
    pub message: String,

    /// 索引的路径
    pub path: String,

    pub stats: ScanStats,

    /// 耗时（毫秒）
    pub took_ms: u64,
}

/// 错误响应
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&EngineError> for ErrorResponse {
    fn from(error: &EngineError) -> Self {
        Self::new(error.code(), error.to_string())
    }
}

// 辅助函数
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// 毫秒 -> "m:ss"
pub fn format_duration(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryError;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(500), "500 B");
        assert_eq!(format_file_size(1024), "1.00 KB");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(1048576), "1.00 MB");
        assert_eq!(format_file_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(562_000), "9:22");
        assert_eq!(format_duration(5_000), "0:05");
    }

    #[test]
    fn test_error_response_from_query_error() {
        let error = EngineError::from(QueryError::UnknownAttribute("colour".into()));
        let response = ErrorResponse::from(&error);
        assert_eq!(response.code, "UNKNOWN_ATTRIBUTE");
        assert_eq!(response.message, "Unknown attribute: colour");
    }

    #[test]
    fn test_find_items_pagination() {
        let query = QueryInfo {
            selection: "media_type != ?".into(),
            args: vec![SqlArg::Integer(0)],
            order_by: None,
        };
        let response = FindItemsResponse::new(query, MediaItemCollection::default())
            .with_pagination(20, 10);
        assert!(!response.pagination.has_more);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["query"]["args"][0], 0);
        assert!(json["query"].get("orderBy").is_none());
        assert_eq!(json["tookMs"], 0);
    }
}
