// query/sort.rs - 排序编译
//! SortSpec -> "<column> ASC|DESC"

use super::error::{QueryError, QueryResult};
use super::types::SortSpec;
use crate::schema::{AttributeMapping, DbField};

/// 编译排序方式；None 表示不指定顺序（由存储决定，不保证稳定）
pub fn compile_sort(sort: Option<&SortSpec>, mapping: &AttributeMapping) -> QueryResult<Option<String>> {
    let Some(sort) = sort else {
        return Ok(None);
    };

    match mapping.resolve(&sort.attribute)? {
        DbField::Single(field) => Ok(Some(format!("{} {}", field.name(), sort.order.keyword()))),
        DbField::Composite(_) => Err(QueryError::InvalidSort(format!(
            "attribute '{}' is derived from several columns and has no column ordering",
            sort.attribute
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_single_attribute() {
        let mapping = AttributeMapping::standard();
        assert_eq!(
            compile_sort(Some(&SortSpec::desc("title")), &mapping).unwrap(),
            Some("title DESC".to_string())
        );
        assert_eq!(
            compile_sort(Some(&SortSpec::asc("modifiedDate")), &mapping).unwrap(),
            Some("date_modified ASC".to_string())
        );
        assert_eq!(compile_sort(None, &mapping).unwrap(), None);
    }

    #[test]
    fn test_sort_errors() {
        let mapping = AttributeMapping::standard();
        assert!(matches!(
            compile_sort(Some(&SortSpec::asc("geolocation")), &mapping),
            Err(QueryError::InvalidSort(_))
        ));
        assert_eq!(
            compile_sort(Some(&SortSpec::asc("rating")), &mapping),
            Err(QueryError::UnknownAttribute("rating".into()))
        );
    }
}
