// query/types.rs - 查询相关类型定义
//! 定义过滤表达式、排序和编译结果的结构

use serde::{Deserialize, Serialize};

/// 过滤表达式里的字面值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FilterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Real(_))
    }

    /// 值的类型名（用于错误信息）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// 比较方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Comparison {
    Equals { value: FilterValue },
    LessThan { value: FilterValue },
    GreaterThan { value: FilterValue },
    /// 闭区间 [low, high]
    Range { low: FilterValue, high: FilterValue },
    Contains { value: FilterValue },
    StartsWith { value: FilterValue },
    EndsWith { value: FilterValue },
}

impl Comparison {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals { .. } => "equals",
            Self::LessThan { .. } => "lessThan",
            Self::GreaterThan { .. } => "greaterThan",
            Self::Range { .. } => "range",
            Self::Contains { .. } => "contains",
            Self::StartsWith { .. } => "startsWith",
            Self::EndsWith { .. } => "endsWith",
        }
    }
}

/// 叶子节点：属性 + 比较
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub attribute: String,
    #[serde(flatten)]
    pub comparison: Comparison,
}

/// 组合运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompositeOp {
    And,
    Or,
}

impl CompositeOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// 组合节点：AND/OR + 有序子节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeFilter {
    #[serde(rename = "type")]
    pub op: CompositeOp,
    pub filters: Vec<FilterExpression>,
}

/// 过滤表达式树
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpression {
    Composite(CompositeFilter),
    Attribute(AttributeFilter),
}

impl FilterExpression {
    fn leaf(attribute: impl Into<String>, comparison: Comparison) -> Self {
        Self::Attribute(AttributeFilter {
            attribute: attribute.into(),
            comparison,
        })
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(attribute, Comparison::Equals { value: value.into() })
    }

    pub fn less_than(attribute: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(attribute, Comparison::LessThan { value: value.into() })
    }

    pub fn greater_than(attribute: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(attribute, Comparison::GreaterThan { value: value.into() })
    }

    pub fn range(
        attribute: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        Self::leaf(attribute, Comparison::Range { low: low.into(), high: high.into() })
    }

    pub fn contains(attribute: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(attribute, Comparison::Contains { value: value.into() })
    }

    pub fn starts_with(attribute: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(attribute, Comparison::StartsWith { value: value.into() })
    }

    pub fn ends_with(attribute: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(attribute, Comparison::EndsWith { value: value.into() })
    }

    pub fn and(filters: Vec<FilterExpression>) -> Self {
        Self::Composite(CompositeFilter { op: CompositeOp::And, filters })
    }

    pub fn or(filters: Vec<FilterExpression>) -> Self {
        Self::Composite(CompositeFilter { op: CompositeOp::Or, filters })
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// 排序方式：属性名 + 方向
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub attribute: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self { attribute: attribute.into(), order: SortOrder::Asc }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self { attribute: attribute.into(), order: SortOrder::Desc }
    }
}

/// 绑定到占位符上的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlArg {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlArg {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for SqlArg {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// 编译结果：带 `?` 占位符的条件模板 + 按位置绑定的参数
///
/// 模板里的占位符个数始终等于 `args.len()`。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompiledPredicate {
    pub template: String,
    pub args: Vec<SqlArg>,
}

impl CompiledPredicate {
    /// 空条件（匹配所有行）
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(template: impl Into<String>, args: Vec<SqlArg>) -> Self {
        Self { template: template.into(), args }
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.template.matches('?').count()
    }

    /// 与另一个条件做 AND；空条件不增加任何约束
    pub fn and(mut self, other: CompiledPredicate) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        self.template = format!("{} AND {}", self.template, other.template);
        self.args.extend(other.args);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_json_shape() {
        let json = r#"{
            "type": "AND",
            "filters": [
                {"attribute": "duration", "op": "range", "low": 10, "high": 100},
                {"attribute": "title", "op": "startsWith", "value": "Intro"}
            ]
        }"#;
        let filter: FilterExpression = serde_json::from_str(json).unwrap();
        assert_eq!(
            filter,
            FilterExpression::and(vec![
                FilterExpression::range("duration", 10, 100),
                FilterExpression::starts_with("title", "Intro"),
            ])
        );
    }

    #[test]
    fn test_sort_spec_default_order() {
        let sort: SortSpec = serde_json::from_str(r#"{"attribute": "title"}"#).unwrap();
        assert_eq!(sort, SortSpec::asc("title"));
    }

    #[test]
    fn test_predicate_and_skips_empty() {
        let base = CompiledPredicate::new("media_type != 0", Vec::new());
        let combined = base.clone().and(CompiledPredicate::empty());
        assert_eq!(combined, base);

        let combined = CompiledPredicate::empty()
            .and(CompiledPredicate::new("parent = ?", vec![SqlArg::Integer(7)]));
        assert_eq!(combined.template, "parent = ?");
        assert_eq!(combined.placeholder_count(), combined.args.len());
    }
}
