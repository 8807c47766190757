// query/filter.rs - 过滤条件编译器
//! 将过滤表达式树编译为带占位符的 WHERE 模板和位置参数
//!
//! 用户给的值永远通过参数绑定，不会拼进模板里。

use super::error::{QueryError, QueryResult};
use super::types::*;
use crate::schema::{AttributeMapping, DbField, SingleDbField};

/// LIKE 的转义字符
const LIKE_ESCAPE: char = '\\';

/// 模式匹配的种类
#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// 过滤器编译器
pub struct FilterCompiler<'a> {
    mapping: &'a AttributeMapping,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(mapping: &'a AttributeMapping) -> Self {
        Self { mapping }
    }

    /// 编译完整的过滤表达式；None 编译为空条件（匹配所有行）
    pub fn compile(&self, filter: Option<&FilterExpression>) -> QueryResult<CompiledPredicate> {
        match filter {
            None => Ok(CompiledPredicate::empty()),
            Some(expr) => self.compile_expr(expr),
        }
    }

    fn compile_expr(&self, expr: &FilterExpression) -> QueryResult<CompiledPredicate> {
        match expr {
            FilterExpression::Attribute(leaf) => self.compile_leaf(leaf),
            FilterExpression::Composite(composite) => self.compile_composite(composite),
        }
    }

    fn compile_composite(&self, composite: &CompositeFilter) -> QueryResult<CompiledPredicate> {
        if composite.filters.is_empty() {
            return Err(QueryError::InvalidFilter(format!(
                "{} filter without operands",
                composite.op.keyword()
            )));
        }

        let mut parts = Vec::with_capacity(composite.filters.len());
        let mut args = Vec::new();
        for child in &composite.filters {
            let compiled = self.compile_expr(child)?;
            parts.push(compiled.template);
            args.extend(compiled.args);
        }

        let separator = format!(" {} ", composite.op.keyword());
        Ok(CompiledPredicate::new(format!("({})", parts.join(&separator)), args))
    }

    fn compile_leaf(&self, leaf: &AttributeFilter) -> QueryResult<CompiledPredicate> {
        // 未知属性先于其他校验报错
        let field = match self.mapping.resolve(&leaf.attribute)? {
            DbField::Single(field) => field,
            DbField::Composite(_) => {
                return Err(QueryError::InvalidFilter(format!(
                    "attribute '{}' is derived from several columns and cannot be compared",
                    leaf.attribute
                )));
            }
        };
        let column = field.name();

        match &leaf.comparison {
            Comparison::Equals { value } => {
                let arg = self.bind(field, &leaf.attribute, "equals", value)?;
                Ok(CompiledPredicate::new(format!("{column} = ?"), vec![arg]))
            }
            Comparison::LessThan { value } => {
                let arg = self.bind_ordered(field, &leaf.attribute, "lessThan", value)?;
                Ok(CompiledPredicate::new(format!("{column} < ?"), vec![arg]))
            }
            Comparison::GreaterThan { value } => {
                let arg = self.bind_ordered(field, &leaf.attribute, "greaterThan", value)?;
                Ok(CompiledPredicate::new(format!("{column} > ?"), vec![arg]))
            }
            Comparison::Range { low, high } => {
                let same_kind = (low.is_numeric() && high.is_numeric())
                    || (low.as_str().is_some() && high.as_str().is_some());
                if !same_kind && !low.is_null() && !high.is_null() {
                    return Err(QueryError::InvalidFilter(format!(
                        "range on '{}' mixes {} and {} bounds",
                        leaf.attribute,
                        low.kind(),
                        high.kind()
                    )));
                }
                let low = self.bind_ordered(field, &leaf.attribute, "range", low)?;
                let high = self.bind_ordered(field, &leaf.attribute, "range", high)?;
                Ok(CompiledPredicate::new(
                    format!("({column} >= ? AND {column} <= ?)"),
                    vec![low, high],
                ))
            }
            Comparison::Contains { value } => {
                self.compile_pattern(field, &leaf.attribute, PatternKind::Contains, value)
            }
            Comparison::StartsWith { value } => {
                self.compile_pattern(field, &leaf.attribute, PatternKind::StartsWith, value)
            }
            Comparison::EndsWith { value } => {
                self.compile_pattern(field, &leaf.attribute, PatternKind::EndsWith, value)
            }
        }
    }

    fn compile_pattern(
        &self,
        field: &SingleDbField,
        attribute: &str,
        kind: PatternKind,
        value: &FilterValue,
    ) -> QueryResult<CompiledPredicate> {
        let op = match kind {
            PatternKind::Contains => "contains",
            PatternKind::StartsWith => "startsWith",
            PatternKind::EndsWith => "endsWith",
        };
        if value.as_str().is_none() {
            return Err(mismatch(attribute, op, value));
        }
        // 转换后必须仍是文本，例如 type 列存的是整数，不能做模式匹配
        let text = match field.to_storage(value) {
            Some(FilterValue::Text(text)) => text,
            _ => return Err(mismatch(attribute, op, value)),
        };

        let escaped = escape_like(&text);
        let pattern = match kind {
            PatternKind::Contains => format!("%{escaped}%"),
            PatternKind::StartsWith => format!("{escaped}%"),
            PatternKind::EndsWith => format!("%{escaped}"),
        };

        Ok(CompiledPredicate::new(
            format!("{} LIKE ? ESCAPE '{LIKE_ESCAPE}'", field.name()),
            vec![SqlArg::Text(pattern)],
        ))
    }

    /// 绑定 lessThan/greaterThan/range 的值：布尔值没有顺序
    fn bind_ordered(
        &self,
        field: &SingleDbField,
        attribute: &str,
        op: &str,
        value: &FilterValue,
    ) -> QueryResult<SqlArg> {
        if let FilterValue::Bool(_) = value {
            return Err(mismatch(attribute, op, value));
        }
        self.bind(field, attribute, op, value)
    }

    /// 经过列的转换器后变为绑定参数
    fn bind(
        &self,
        field: &SingleDbField,
        attribute: &str,
        op: &str,
        value: &FilterValue,
    ) -> QueryResult<SqlArg> {
        if value.is_null() {
            return Err(QueryError::InvalidFilter(format!(
                "{op} on '{attribute}' requires a value"
            )));
        }
        let stored = field.to_storage(value).ok_or_else(|| mismatch(attribute, op, value))?;
        // 例如文本列和数字比较，SQL 不会报错但永远匹配不到
        if !field.kind().accepts(&stored) {
            return Err(mismatch(attribute, op, value));
        }
        match stored {
            FilterValue::Integer(v) => Ok(SqlArg::Integer(v)),
            FilterValue::Real(v) => Ok(SqlArg::Real(v)),
            FilterValue::Text(v) => Ok(SqlArg::Text(v)),
            FilterValue::Bool(v) => Ok(SqlArg::Integer(v as i64)),
            FilterValue::Null => Err(QueryError::InvalidFilter(format!(
                "{op} on '{attribute}' requires a value"
            ))),
        }
    }
}

fn mismatch(attribute: &str, op: &str, value: &FilterValue) -> QueryError {
    QueryError::InvalidFilter(format!(
        "{op} on '{attribute}' does not accept a {} value",
        value.kind()
    ))
}

/// 转义 LIKE 通配符，使其按字面匹配
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '%' || ch == '_' || ch == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        AttributeMapping, AttributeValue, ColumnKind, StoredValue, COL_ALBUM_ARTIST, COL_ARTIST,
        COL_DURATION, COL_TITLE,
    };
    use proptest::prelude::*;

    fn compile(filter: &FilterExpression) -> QueryResult<CompiledPredicate> {
        let mapping = AttributeMapping::standard();
        FilterCompiler::new(&mapping).compile(Some(filter))
    }

    #[test]
    fn test_none_compiles_to_empty() {
        let mapping = AttributeMapping::standard();
        let compiled = FilterCompiler::new(&mapping).compile(None).unwrap();
        assert_eq!(compiled.template, "");
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn test_range_filter() {
        let compiled = compile(&FilterExpression::range("duration", 10, 100)).unwrap();
        assert_eq!(compiled.template, "(duration >= ? AND duration <= ?)");
        assert_eq!(compiled.args, vec![SqlArg::Integer(10), SqlArg::Integer(100)]);
    }

    #[test]
    fn test_equals_uses_translator() {
        let compiled = compile(&FilterExpression::equals("type", "AUDIO")).unwrap();
        assert_eq!(compiled.template, "media_type = ?");
        assert_eq!(compiled.args, vec![SqlArg::Integer(2)]);

        let compiled = compile(&FilterExpression::greater_than("modifiedDate", 1_700_000_000_000i64)).unwrap();
        assert_eq!(compiled.template, "date_modified > ?");
        assert_eq!(compiled.args, vec![SqlArg::Integer(1_700_000_000)]);
    }

    #[test]
    fn test_date_below_one_second_binds_real_seconds() {
        let compiled = compile(&FilterExpression::less_than("modifiedDate", 1_700_000_000_500i64)).unwrap();
        assert_eq!(compiled.args, vec![SqlArg::Real(1_700_000_000.5)]);

        let compiled = compile(&FilterExpression::range("addedDate", 1_000_100i64, 1_000_900i64)).unwrap();
        assert_eq!(compiled.args, vec![SqlArg::Real(1_000.1), SqlArg::Real(1_000.9)]);

        let compiled = compile(&FilterExpression::equals("modifiedDate", 2_000.0)).unwrap();
        assert_eq!(compiled.args, vec![SqlArg::Integer(2)]);
    }

    #[test]
    fn test_pattern_wildcards() {
        let contains = compile(&FilterExpression::contains("title", "live")).unwrap();
        assert_eq!(contains.template, "title LIKE ? ESCAPE '\\'");
        assert_eq!(contains.args, vec![SqlArg::from("%live%")]);

        let starts = compile(&FilterExpression::starts_with("title", "live")).unwrap();
        assert_eq!(starts.args, vec![SqlArg::from("live%")]);

        let ends = compile(&FilterExpression::ends_with("title", "live")).unwrap();
        assert_eq!(ends.args, vec![SqlArg::from("%live")]);
    }

    #[test]
    fn test_starts_with_escapes_literal_percent() {
        let compiled = compile(&FilterExpression::starts_with("title", "100%")).unwrap();
        assert_eq!(compiled.args, vec![SqlArg::from("100\\%%")]);

        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_composite_joins_children_in_order() {
        let filter = FilterExpression::or(vec![
            FilterExpression::equals("title", "Intro"),
            FilterExpression::and(vec![
                FilterExpression::range("duration", 10, 100),
                FilterExpression::less_than("size", 2048),
            ]),
        ]);
        let compiled = compile(&filter).unwrap();
        assert_eq!(
            compiled.template,
            "(title = ? OR ((duration >= ? AND duration <= ?) AND _size < ?))"
        );
        assert_eq!(
            compiled.args,
            vec![
                SqlArg::from("Intro"),
                SqlArg::Integer(10),
                SqlArg::Integer(100),
                SqlArg::Integer(2048),
            ]
        );
    }

    #[test]
    fn test_empty_composite_is_invalid() {
        let err = compile(&FilterExpression::and(Vec::new())).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn test_composite_attribute_cannot_be_compared() {
        let err = compile(&FilterExpression::equals("artists", "Nina")).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn test_composite_attribute_projection_calls_combiner() {
        fn join(raw: &[StoredValue]) -> Option<AttributeValue> {
            let parts: Vec<&str> = raw.iter().filter_map(|v| v.as_str()).collect();
            Some(AttributeValue::Text(parts.join("+")))
        }
        let mapping = AttributeMapping::builder()
            .single("title", COL_TITLE, ColumnKind::Text)
            .composite(
                "artists",
                &[(COL_ARTIST, ColumnKind::Text), (COL_ALBUM_ARTIST, ColumnKind::Text)],
                Some(join),
            )
            .build();

        let value = mapping
            .combine("artists", &[StoredValue::from("Nina"), StoredValue::from("Band")])
            .unwrap();
        assert_eq!(value, Some(AttributeValue::Text("Nina+Band".into())));

        let err = FilterCompiler::new(&mapping)
            .compile(Some(&FilterExpression::contains("artists", "Nina")))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn test_unknown_attribute_reported_first() {
        // 值也是错的，但未知属性优先
        let err = compile(&FilterExpression::contains("rating", FilterValue::Null)).unwrap_err();
        assert_eq!(err, QueryError::UnknownAttribute("rating".into()));

        let nested = FilterExpression::and(vec![
            FilterExpression::equals("title", "ok"),
            FilterExpression::equals("nope", 1),
        ]);
        assert_eq!(compile(&nested).unwrap_err(), QueryError::UnknownAttribute("nope".into()));
    }

    #[test]
    fn test_value_mismatches_are_invalid_filter() {
        let cases = vec![
            FilterExpression::equals("title", FilterValue::Null),
            FilterExpression::contains("duration", 10),
            FilterExpression::starts_with("title", true),
            FilterExpression::less_than("duration", false),
            FilterExpression::range("duration", 10, "zz"),
            FilterExpression::range("duration", FilterValue::Null, 100),
            FilterExpression::equals("type", "FOLDER"),
            FilterExpression::equals("modifiedDate", "yesterday"),
            FilterExpression::contains("type", "AUD"),
            FilterExpression::less_than("title", 5),
            FilterExpression::equals("duration", "abc"),
            FilterExpression::range("album", 1, 9),
            FilterExpression::equals("mimeType", true),
        ];
        for filter in cases {
            let err = compile(&filter).unwrap_err();
            assert!(matches!(err, QueryError::InvalidFilter(_)), "{filter:?} -> {err:?}");
        }
    }

    #[test]
    fn test_failed_child_fails_whole_tree() {
        let filter = FilterExpression::and(vec![
            FilterExpression::equals("title", "ok"),
            FilterExpression::or(Vec::new()),
        ]);
        assert!(compile(&filter).is_err());
    }

    fn leaf_strategy() -> impl Strategy<Value = FilterExpression> {
        prop_oneof![
            any::<i64>().prop_map(|v| FilterExpression::equals("duration", v)),
            (any::<i64>(), any::<i64>()).prop_map(|(a, b)| FilterExpression::range("size", a, b)),
            "[a-z%_?]{0,8}".prop_map(|s| FilterExpression::contains("title", s)),
            "[a-z?]{0,8}".prop_map(|s| FilterExpression::ends_with("album", s)),
        ]
    }

    fn filter_strategy() -> impl Strategy<Value = FilterExpression> {
        leaf_strategy().prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(FilterExpression::and),
                prop::collection::vec(inner, 1..4).prop_map(FilterExpression::or),
            ]
        })
    }

    fn count_leaf_args(filter: &FilterExpression) -> usize {
        match filter {
            FilterExpression::Attribute(leaf) => match leaf.comparison {
                Comparison::Range { .. } => 2,
                _ => 1,
            },
            FilterExpression::Composite(c) => c.filters.iter().map(count_leaf_args).sum(),
        }
    }

    proptest! {
        #[test]
        fn prop_placeholders_match_args(filter in filter_strategy()) {
            let compiled = compile(&filter).unwrap();
            // 模板里只有列名和关键字，用户值不会带入 '?'
            prop_assert_eq!(compiled.placeholder_count(), compiled.args.len());
            prop_assert_eq!(compiled.args.len(), count_leaf_args(&filter));
        }
    }

    #[test]
    fn test_column_constants_used() {
        let compiled = compile(&FilterExpression::less_than("duration", 5)).unwrap();
        assert!(compiled.template.starts_with(COL_DURATION));
    }
}
