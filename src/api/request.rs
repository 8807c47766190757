// api/request.rs - 查询请求类型
//! 定义 findItems / getFolders 请求的结构化类型

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::query::{FilterExpression, SortSpec};

/// findItems 请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindItemsRequest {
    /// 只在该目录下查找（目录行 ID）
    #[serde(default)]
    pub folder_id: Option<i64>,

    /// 过滤表达式，缺省表示不过滤
    #[serde(default)]
    pub filter: Option<FilterExpression>,

    /// 排序方式，缺省表示存储默认顺序
    #[serde(default)]
    pub sort: Option<SortSpec>,

    /// 返回结果数量限制
    #[serde(default = "default_count")]
    pub count: usize,

    /// 跳过的结果数量（用于分页）
    #[serde(default)]
    pub offset: usize,
}

fn default_count() -> usize { 20 }

impl Default for FindItemsRequest {
    fn default() -> Self {
        Self {
            folder_id: None,
            filter: None,
            sort: None,
            count: default_count(),
            offset: 0,
        }
    }
}

impl FindItemsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析 JSON 请求；没有给出 count 时使用配置的默认值
    pub fn from_json(input: &str, default_count: usize) -> serde_json::Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(input)?;
        if let Some(object) = value.as_object_mut() {
            object.entry("count").or_insert_with(|| default_count.into());
        }
        serde_json::from_value(value)
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_folder(mut self, folder_id: i64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// 重新索引请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    /// 要索引的文件或目录路径
    pub path: String,
}

impl IndexRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// 解析 ":index <路径>" 命令，其他输入返回 None
    pub fn from_command(input: &str) -> Option<Self> {
        let rest = input.strip_prefix(":index")?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some(Self::new(rest.trim()))
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let request: FindItemsRequest = serde_json::from_str(
            r#"{"folderId": 3, "sort": {"attribute": "title", "order": "DESC"}}"#,
        )
        .unwrap();
        assert_eq!(request.folder_id, Some(3));
        assert_eq!(request.count, 20);
        assert_eq!(request.offset, 0);
        assert!(request.filter.is_none());
        assert_eq!(request.sort, Some(SortSpec::desc("title")));
    }

    #[test]
    fn test_json_request_uses_configured_count() {
        let request = FindItemsRequest::from_json(r#"{"offset": 5}"#, 50).unwrap();
        assert_eq!(request.count, 50);
        assert_eq!(request.offset, 5);

        let explicit = FindItemsRequest::from_json(r#"{"count": 3}"#, 50).unwrap();
        assert_eq!(explicit.count, 3);

        assert!(FindItemsRequest::from_json("[1, 2]", 50).is_err());
    }

    #[test]
    fn test_index_command() {
        let request = IndexRequest::from_command(":index  Music/new ").unwrap();
        assert_eq!(request, IndexRequest::new("Music/new"));
        assert_eq!(request.path(), Path::new("Music/new"));

        assert_eq!(IndexRequest::from_command(":index"), Some(IndexRequest::new("")));
        assert!(IndexRequest::from_command(":indexes").is_none());
        assert!(IndexRequest::from_command("live --type=AUDIO").is_none());
    }
}
