// query/parser.rs - 查询解析器
//! 解析命令行风格的查询语法为 FindItemsRequest
//!
//! 支持的语法:
//! - 自由文本: "live concert"  (等价于 title 包含该文本)
//! - 相等: --type=AUDIO, --album="Kind of Blue"
//! - 比较: --duration<60000, --size>1048576
//! - 范围: --duration=10000..300000
//! - 模式: --title~=live (包含), --title^=Intro (前缀), --title$=mix (后缀)
//! - 组合方式: --match=any (OR)，默认 all (AND)
//! - 目录: --folder=12
//! - 排序: --sort=title 或 --sort=modifiedDate:desc
//! - 分页: --limit=20 --offset=40

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{QueryError, QueryResult};
use super::types::*;
use crate::api::FindItemsRequest;

// 正则表达式预编译
static ARG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // 匹配 --key<op>value 或 --key<op>"value with spaces"
    Regex::new(r#"--([A-Za-z][A-Za-z\-]*)(~=|\^=|\$=|=|<|>)(?:"([^"]*)"|(\S+))"#).unwrap()
});

static RANGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)\.\.(-?\d+(?:\.\d+)?)$").unwrap()
});

/// 一个 --key<op>value 参数
#[derive(Debug)]
struct Arg {
    key: String,
    op: String,
    value: String,
    quoted: bool,
}

/// 查询解析器
pub struct QueryParser {
    /// 自由文本匹配的属性
    text_attribute: String,
    default_count: usize,
}

impl QueryParser {
    /// 创建新的解析器
    pub fn new() -> Self {
        Self {
            text_attribute: "title".to_string(),
            default_count: FindItemsRequest::default().count,
        }
    }

    /// 设置自由文本匹配的属性
    pub fn with_text_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.text_attribute = attribute.into();
        self
    }

    pub fn with_default_count(mut self, count: usize) -> Self {
        self.default_count = count;
        self
    }

    /// 解析查询字符串
    pub fn parse(&self, input: &str) -> QueryResult<FindItemsRequest> {
        let input = input.trim();
        let mut args: Vec<Arg> = Vec::new();
        let mut text_parts: Vec<&str> = Vec::new();

        // 提取所有 --key<op>value 参数
        let mut last_end = 0;
        for cap in ARG_PATTERN.captures_iter(input) {
            let Some(full_match) = cap.get(0) else { continue };

            // 收集参数之前的文本
            if full_match.start() > last_end {
                text_parts.push(input[last_end..full_match.start()].trim());
            }
            last_end = full_match.end();

            let quoted = cap.get(3).is_some();
            // 优先使用带引号的值，否则使用不带引号的值
            let value = cap.get(3)
                .or_else(|| cap.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            args.push(Arg {
                key: cap[1].to_string(),
                op: cap[2].to_string(),
                value,
                quoted,
            });
        }

        // 收集最后一个参数之后的文本
        if last_end < input.len() {
            text_parts.push(input[last_end..].trim());
        }

        let text = text_parts.iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        let mut request = FindItemsRequest::new().with_count(self.default_count);
        let mut leaves: Vec<FilterExpression> = Vec::new();
        let mut op = CompositeOp::And;

        if !text.is_empty() {
            leaves.push(FilterExpression::contains(self.text_attribute.clone(), text));
        }

        for arg in args {
            match (arg.key.as_str(), arg.op.as_str()) {
                ("sort", "=") => request.sort = Some(parse_sort(&arg.value)?),
                ("folder", "=") => request.folder_id = Some(parse_number(&arg)?),
                ("limit", "=") => request.count = parse_number(&arg)?,
                ("offset", "=") => request.offset = parse_number(&arg)?,
                ("match", "=") => {
                    op = match arg.value.to_ascii_lowercase().as_str() {
                        "any" | "or" => CompositeOp::Or,
                        "all" | "and" => CompositeOp::And,
                        other => {
                            return Err(QueryError::InvalidFilter(format!(
                                "unknown match mode '{other}'"
                            )));
                        }
                    }
                }
                _ => leaves.push(self.parse_leaf(&arg)),
            }
        }

        request.filter = match leaves.len() {
            0 => None,
            1 => leaves.pop(),
            _ => Some(FilterExpression::Composite(CompositeFilter { op, filters: leaves })),
        };
        Ok(request)
    }

    fn parse_leaf(&self, arg: &Arg) -> FilterExpression {
        let attribute = arg.key.clone();
        match arg.op.as_str() {
            "~=" => FilterExpression::contains(attribute, arg.value.clone()),
            "^=" => FilterExpression::starts_with(attribute, arg.value.clone()),
            "$=" => FilterExpression::ends_with(attribute, arg.value.clone()),
            "<" => FilterExpression::less_than(attribute, literal(arg)),
            ">" => FilterExpression::greater_than(attribute, literal(arg)),
            _ => {
                if !arg.quoted {
                    if let Some(cap) = RANGE_PATTERN.captures(&arg.value) {
                        return FilterExpression::range(
                            attribute,
                            number_literal(&cap[1]),
                            number_literal(&cap[2]),
                        );
                    }
                }
                FilterExpression::equals(attribute, literal(arg))
            }
        }
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析排序: "title" / "title:desc" / "title:asc"
fn parse_sort(value: &str) -> QueryResult<SortSpec> {
    let (attribute, order) = match value.split_once(':') {
        Some((attribute, order)) => (attribute, order),
        None => (value, "asc"),
    };
    if attribute.is_empty() {
        return Err(QueryError::InvalidSort("missing sort attribute".to_string()));
    }
    let order = match order.to_ascii_lowercase().as_str() {
        "asc" => SortOrder::Asc,
        "desc" => SortOrder::Desc,
        other => return Err(QueryError::InvalidSort(format!("unknown sort order '{other}'"))),
    };
    Ok(SortSpec { attribute: attribute.to_string(), order })
}

fn parse_number<T: std::str::FromStr>(arg: &Arg) -> QueryResult<T> {
    arg.value.parse().map_err(|_| {
        QueryError::InvalidFilter(format!("--{} expects a number, got '{}'", arg.key, arg.value))
    })
}

/// 未加引号的数字按数字处理，其余按文本
fn literal(arg: &Arg) -> FilterValue {
    if arg.quoted {
        FilterValue::Text(arg.value.clone())
    } else {
        number_literal(&arg.value)
    }
}

fn number_literal(value: &str) -> FilterValue {
    if let Ok(v) = value.parse::<i64>() {
        FilterValue::Integer(v)
    } else if let Ok(v) = value.parse::<f64>() {
        FilterValue::Real(v)
    } else {
        FilterValue::Text(value.to_string())
    }
}
