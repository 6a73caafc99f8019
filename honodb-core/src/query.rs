// src/query.rs
//! Condition parsing and matching
//!
//! A condition is a JSON object mapping dotted field paths to expected
//! values:
//!
//! ```json
//! { "name": "foo", "address.city": "Budapest" }
//! ```
//!
//! A value that is an object made only of `$` keys is an operator object
//! (`{"age": {"$gte": 18, "$lt": 65}}`). `$and` / `$or` at the top level
//! combine nested conditions. Every clause must hold; `{}` matches everything.

pub mod operators;

use serde_json::Value;

use crate::document::{type_name, Document, DocumentId, ID_FIELD};
use crate::error::{HonoError, Result};
use self::operators::{lookup_operator, OperatorMatcher};

/// A parsed, validated condition
///
/// Parsing happens before any collection state is touched, so a malformed
/// condition fails with `ParseError` and nothing else.
#[derive(Clone)]
pub struct Condition {
    clauses: Vec<Clause>,
    source: Value,
}

#[derive(Clone)]
enum Clause {
    Field {
        path: String,
        tests: Vec<(&'static dyn OperatorMatcher, Value)>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            HonoError::Parse(format!("condition must be an object, got {}", type_name(value)))
        })?;

        let mut clauses = Vec::with_capacity(obj.len());
        for (key, expected) in obj {
            let clause = match key.as_str() {
                "$and" => Clause::And(Self::parse_list(key, expected)?),
                "$or" => Clause::Or(Self::parse_list(key, expected)?),
                k if k.starts_with('$') => {
                    return Err(HonoError::Parse(format!("Unknown top-level operator: {}", k)))
                }
                "" => return Err(HonoError::Parse("empty field path in condition".to_string())),
                path => Clause::Field {
                    path: path.to_string(),
                    tests: Self::parse_tests(path, expected)?,
                },
            };
            clauses.push(clause);
        }

        Ok(Condition {
            clauses,
            source: value.clone(),
        })
    }

    fn parse_list(op: &str, value: &Value) -> Result<Vec<Condition>> {
        match value {
            Value::Array(items) if !items.is_empty() => items.iter().map(Self::parse).collect(),
            _ => Err(HonoError::Parse(format!(
                "{} needs a non-empty array of conditions",
                op
            ))),
        }
    }

    fn parse_tests(path: &str, expected: &Value) -> Result<Vec<(&'static dyn OperatorMatcher, Value)>> {
        let eq = lookup_operator("$eq")?;
        let obj = match expected {
            Value::Object(obj) if !obj.is_empty() => obj,
            // literals, arrays and {} compare for equality
            other => return Ok(vec![(eq, other.clone())]),
        };

        let operator_keys = obj.keys().filter(|k| k.starts_with('$')).count();
        if operator_keys == 0 {
            return Ok(vec![(eq, expected.clone())]);
        }
        if operator_keys != obj.len() {
            return Err(HonoError::Parse(format!(
                "field '{}' mixes operators with plain keys",
                path
            )));
        }

        obj.iter()
            .map(|(name, operand)| {
                let op = lookup_operator(name)?;
                op.validate(operand)?;
                Ok((op, operand.clone()))
            })
            .collect()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Field { path, tests } => {
                let value = doc.get(path);
                tests.iter().all(|(op, operand)| op.matches(value, operand))
            }
            Clause::And(conds) => conds.iter().all(|c| c.matches(doc)),
            Clause::Or(conds) => conds.iter().any(|c| c.matches(doc)),
        })
    }

    /// The condition as written
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// `Some(id)` when the condition is exactly an equality on `id`
    ///
    /// Ids are unique, so such a condition matches at most the indexed
    /// document and the scan can be skipped.
    pub fn id_equality(&self) -> Option<DocumentId> {
        match self.clauses.as_slice() {
            [Clause::Field { path, tests }] if path == ID_FIELD => match tests.as_slice() {
                [(op, operand)] if op.name() == "$eq" => DocumentId::from_value(operand).ok(),
                _ => None,
            },
            _ => None,
        }
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Condition({})", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn student() -> Document {
        Document::from_value(json!({
            "id": "s100",
            "name": "foo",
            "age": 21,
            "address": {"city": "Budapest", "zip": "1111"},
            "grades": [5, 4]
        }))
        .unwrap()
    }

    fn check(cond: Value) -> bool {
        Condition::parse(&cond).unwrap().matches(&student())
    }

    #[test]
    fn test_empty_condition_matches_all() {
        assert!(check(json!({})));
    }

    #[test]
    fn test_flat_equality() {
        assert!(check(json!({"name": "foo"})));
        assert!(check(json!({"name": "foo", "age": 21.0})));
        assert!(!check(json!({"name": "foo", "age": 22})));
    }

    #[test]
    fn test_missing_field_never_matches() {
        assert!(!check(json!({"nickname": null})));
        assert!(!check(json!({"nickname": {"$ne": "x"}})));
        assert!(!check(json!({"address.street": {"$nin": ["x"]}})));
    }

    #[test]
    fn test_dotted_paths() {
        assert!(check(json!({"address.city": "Budapest"})));
        assert!(check(json!({"grades.0": 5})));
        assert!(!check(json!({"address.city": "Szeged"})));
    }

    #[test]
    fn test_nested_object_literal_is_structural() {
        assert!(check(json!({"address": {"zip": "1111", "city": "Budapest"}})));
        assert!(!check(json!({"address": {"city": "Budapest"}})));
        assert!(check(json!({"grades": [5, 4]})));
    }

    #[test]
    fn test_operator_objects() {
        assert!(check(json!({"age": {"$gte": 18, "$lt": 65}})));
        assert!(!check(json!({"age": {"$gt": 21}})));
        assert!(check(json!({"name": {"$in": ["foo", "bar"]}})));
    }

    #[test]
    fn test_and_or() {
        assert!(check(json!({"$or": [{"name": "bar"}, {"age": 21}]})));
        assert!(!check(json!({"$or": [{"name": "bar"}, {"age": 20}]})));
        assert!(check(json!({"$and": [{"name": "foo"}, {"address.city": "Budapest"}]})));
    }

    #[test]
    fn test_parse_errors() {
        for cond in [
            json!([1, 2]),
            json!("name"),
            json!({"age": {"$regex": "x"}}),
            json!({"age": {"$gt": 1, "plain": 2}}),
            json!({"age": {"$in": 3}}),
            json!({"$nor": []}),
            json!({"$or": []}),
            json!({"$and": {"a": 1}}),
            json!({"": 1}),
        ] {
            let err = Condition::parse(&cond).unwrap_err();
            assert!(matches!(err, HonoError::Parse(_)), "{} -> {:?}", cond, err);
        }
    }

    #[test]
    fn test_id_equality_shortcut() {
        let cond = Condition::parse(&json!({"id": "s100"})).unwrap();
        assert_eq!(cond.id_equality(), Some(DocumentId::String("s100".into())));

        let cond = Condition::parse(&json!({"id": {"$eq": 7}})).unwrap();
        assert_eq!(cond.id_equality(), Some(DocumentId::Int(7)));

        for other in [json!({"id": 7.5}), json!({"id": "a", "x": 1}), json!({"id": {"$gt": 1}})] {
            assert_eq!(Condition::parse(&other).unwrap().id_equality(), None);
        }
    }
}
