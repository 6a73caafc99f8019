// honodb-core/src/find_options.rs
// Find query options: projection, sort, limit, skip

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::document::ID_FIELD;
use crate::error::{HonoError, Result};
use crate::value_utils::{compare_values, get_nested_value};

/// Options for find queries
///
/// On the wire `projection` and `sort` are JSON objects whose key order is
/// kept: `{"projection": {"name": 1}, "sort": {"age": -1, "name": 1}, "limit": 5}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FindOptions {
    /// Projection: field → 1 (include) or 0 (exclude)
    /// Special case: `id` can be excluded in include mode
    #[serde(with = "field_spec", skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<(String, i32)>>,

    /// Sort: [(field, direction)], direction: 1 (asc) or -1 (desc)
    #[serde(with = "field_spec", skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<(String, i32)>>,

    /// Limit: maximum number of documents to return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Skip: number of documents to skip (for pagination)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Vec<(String, i32)>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Vec<(String, i32)>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == FindOptions::default()
    }

    /// Reject specs that cannot be applied. Runs before any chunk is read.
    pub fn validate(&self) -> Result<()> {
        if let Some(projection) = &self.projection {
            for (field, action) in projection {
                check_field(field, "projection")?;
                if *action != 0 && *action != 1 {
                    return Err(HonoError::Parse(format!(
                        "projection of '{}' must be 1 or 0, got {}",
                        field, action
                    )));
                }
            }
            let includes = projection.iter().any(|(_, a)| *a == 1);
            let excludes_other = projection.iter().any(|(f, a)| *a == 0 && f != ID_FIELD);
            if includes && excludes_other {
                return Err(HonoError::Parse(
                    "projection cannot mix included and excluded fields".to_string(),
                ));
            }
        }
        if let Some(sort) = &self.sort {
            for (field, direction) in sort {
                check_field(field, "sort")?;
                if *direction != 1 && *direction != -1 {
                    return Err(HonoError::Parse(format!(
                        "sort direction of '{}' must be 1 or -1, got {}",
                        field, direction
                    )));
                }
            }
        }
        Ok(())
    }

    /// Sort, then skip/limit, then project a full result set
    pub fn apply(&self, mut docs: Vec<Value>) -> Vec<Value> {
        if let Some(sort) = &self.sort {
            apply_sort(&mut docs, sort);
        }
        let docs = apply_limit_skip(docs, self.limit, self.skip);
        match &self.projection {
            Some(projection) => docs
                .into_iter()
                .map(|doc| apply_projection(&doc, projection))
                .collect(),
            None => docs,
        }
    }
}

fn check_field(field: &str, clause: &str) -> Result<()> {
    if field.is_empty() {
        return Err(HonoError::Parse(format!("empty field path in {}", clause)));
    }
    Ok(())
}

/// Apply projection to a document
///
/// Include mode keeps `id` first, then the listed fields in spec order.
/// Dotted paths are copied under their dotted key; missing fields are left out.
/// Exclude mode only removes top-level fields.
pub fn apply_projection(doc: &Value, projection: &[(String, i32)]) -> Value {
    let obj = match doc {
        Value::Object(obj) if !projection.is_empty() => obj,
        _ => return doc.clone(),
    };

    let include_mode = projection.iter().any(|(_, action)| *action == 1);
    let mut result = Map::new();

    if include_mode {
        let id_excluded = projection.iter().any(|(f, a)| f == ID_FIELD && *a == 0);
        if !id_excluded {
            if let Some(id) = obj.get(ID_FIELD) {
                result.insert(ID_FIELD.to_string(), id.clone());
            }
        }
        for (field, action) in projection {
            if *action == 1 {
                if let Some(value) = get_nested_value(doc, field) {
                    result.insert(field.clone(), value.clone());
                }
            }
        }
    } else {
        for (key, value) in obj {
            if !projection.iter().any(|(f, _)| f == key) {
                result.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(result)
}

/// Apply sort to documents
///
/// Stable: documents that compare equal keep their scan order.
pub fn apply_sort(docs: &mut [Value], sort: &[(String, i32)]) {
    if sort.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let cmp = sort_order(get_nested_value(a, field), get_nested_value(b, field));
            if cmp != Ordering::Equal {
                return if *direction == 1 { cmp } else { cmp.reverse() };
            }
        }
        Ordering::Equal
    });
}

/// Missing fields sort first, then values by type, then by value
fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => type_priority(x)
            .cmp(&type_priority(y))
            .then_with(|| match (x, y) {
                (Value::Bool(b1), Value::Bool(b2)) => b1.cmp(b2),
                _ => compare_values(x, y).unwrap_or(Ordering::Equal),
            }),
    }
}

/// Get type priority for mixed-type sorting
fn type_priority(val: &Value) -> u8 {
    match val {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
    }
}

/// Apply limit and skip to documents
pub fn apply_limit_skip(docs: Vec<Value>, limit: Option<usize>, skip: Option<usize>) -> Vec<Value> {
    docs.into_iter()
        .skip(skip.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// `[(field, n)]` as an ordered JSON object `{"field": n}`
mod field_spec {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::{Map, Value};

    pub fn serialize<S: Serializer>(
        spec: &Option<Vec<(String, i32)>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        spec.as_ref()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, n)| (field.clone(), Value::from(*n)))
                    .collect::<Map<String, Value>>()
            })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<(String, i32)>>, D::Error> {
        let map: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
        map.map(|fields| {
            fields
                .into_iter()
                .map(|(field, value)| {
                    let n = match &value {
                        Value::Bool(b) => Some(i32::from(*b)),
                        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
                        _ => None,
                    };
                    n.map(|n| (field.clone(), n)).ok_or_else(|| {
                        D::Error::custom(format!("'{}' needs an integer, got {}", field, value))
                    })
                })
                .collect::<Result<Vec<_>, D::Error>>()
        })
        .transpose()
    }
}
