//! Grid sort specs to an order clause.
//!
//! A dotted field sorts on an associated table: `author.name` becomes `authors.name`. Only the
//! last two segments are kept, so `publisher.country.name` yields `countries.name`.

use crate::case::pluralize;
use crate::error::AppError;
use crate::options::Options;
use serde_json::Value;

pub fn qualify(field: &str) -> String {
    let parts: Vec<&str> = field.split('.').collect();
    match parts.as_slice() {
        [.., table, column] => format!("{}.{}", pluralize(table), column),
        _ => field.to_string(),
    }
}

/// Replace `sort`/`dir` with `order`. Without `sort` the options are returned untouched.
pub fn translate(mut opts: Options) -> Result<Options, AppError> {
    let Some(sort) = opts.remove("sort") else {
        return Ok(opts);
    };
    let dir = opts.remove("dir");
    let order = match sort {
        Value::Array(specs) => specs
            .iter()
            .map(term_from_spec)
            .collect::<Result<Vec<_>, _>>()?
            .join(","),
        Value::Object(_) => term_from_spec(&sort)?,
        Value::String(field) => term(&field, dir.as_ref())?,
        Value::Null => return Ok(opts),
        other => return Err(AppError::BadRequest(format!("invalid sort: {}", other))),
    };
    opts.insert("order".into(), Value::String(order));
    Ok(opts)
}

/// `{sort, dir}`, or the `{property, direction}` form sent by newer grids.
fn term_from_spec(spec: &Value) -> Result<String, AppError> {
    let field = spec
        .get("sort")
        .or_else(|| spec.get("property"))
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest(format!("sort entry without a field: {}", spec)))?;
    let dir = spec.get("dir").or_else(|| spec.get("direction"));
    term(field, dir)
}

fn term(field: &str, dir: Option<&Value>) -> Result<String, AppError> {
    let dir = match dir {
        None | Some(Value::Null) => "ASC",
        Some(Value::String(d)) => d.as_str(),
        Some(other) => return Err(AppError::BadRequest(format!("invalid sort direction: {}", other))),
    };
    let valid = field
        .split('.')
        .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !valid {
        return Err(AppError::BadRequest(format!("invalid sort field: {}", field)));
    }
    Ok(format!("{} {}", qualify(field), dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::from_value;
    use serde_json::json;

    fn order_of(v: Value) -> Option<Value> {
        translate(from_value(v)).unwrap().get("order").cloned()
    }

    #[test]
    fn qualifies_last_two_segments() {
        assert_eq!(qualify("title"), "title");
        assert_eq!(qualify("author.name"), "authors.name");
        assert_eq!(qualify("a.b.c"), "bs.c");
    }

    #[test]
    fn single_field_defaults_to_ascending() {
        assert_eq!(order_of(json!({"sort": "title"})), Some(json!("title ASC")));
        assert_eq!(
            order_of(json!({"sort": "title", "dir": "DESC"})),
            Some(json!("title DESC"))
        );
    }

    #[test]
    fn list_is_joined_in_order() {
        let order = order_of(json!({"sort": [
            {"sort": "author.name", "dir": "ASC"},
            {"sort": "title", "dir": "DESC"}
        ]}));
        assert_eq!(order, Some(json!("authors.name ASC,title DESC")));
    }

    #[test]
    fn property_direction_form() {
        let order = order_of(json!({"sort": [{"property": "title"}, {"property": "publisher.name", "direction": "DESC"}]}));
        assert_eq!(order, Some(json!("title ASC,publishers.name DESC")));
    }

    #[test]
    fn sort_and_dir_are_removed() {
        let out = translate(from_value(json!({"sort": "title", "dir": "ASC", "limit": 2}))).unwrap();
        assert!(!out.contains_key("sort") && !out.contains_key("dir"));
        assert_eq!(out.get("limit"), Some(&json!(2)));
    }

    #[test]
    fn non_identifier_fields_are_refused() {
        for field in ["ȺȺ_by.name", "author..name", "title; drop", ""] {
            let err = translate(from_value(json!({"sort": field}))).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{}", field);
        }
    }

    #[test]
    fn absent_sort_is_a_no_op() {
        let out = translate(from_value(json!({"dir": "DESC"}))).unwrap();
        assert_eq!(Value::Object(out), json!({"dir": "DESC"}));
    }
}
