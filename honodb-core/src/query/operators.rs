// src/query/operators.rs
//! Field operators for conditions
//!
//! Each operator is a separate type implementing [`OperatorMatcher`] and is
//! looked up by name in [`OPERATOR_REGISTRY`].
//!
//! ```text
//! OperatorMatcher trait
//!     ↓
//! ┌──────────────────────────┬────────────────┐
//! │ Comparison               │ Membership     │
//! │ ($eq $ne $gt $gte ...)   │ ($in $nin)     │
//! └──────────────────────────┴────────────────┘
//! ```
//!
//! Operands are checked once, when a condition is parsed, so matching itself
//! cannot fail. A missing field never matches, `$ne` and `$nin` included.

use std::cmp::Ordering;
use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_json::Value;

use crate::document::type_name;
use crate::error::{HonoError, Result};
use crate::value_utils::{compare_values, values_equal};

// ============================================================================
// TRAIT DEFINITION
// ============================================================================

/// Trait for all field operators
///
/// ```rust
/// use serde_json::json;
/// use honodb_core::query::operators::{GtOperator, OperatorMatcher};
///
/// assert!(GtOperator.matches(Some(&json!(10)), &json!(5)));
/// assert!(!GtOperator.matches(None, &json!(5)));
/// ```
pub trait OperatorMatcher: Send + Sync {
    /// Operator name as written in conditions, e.g. "$gt"
    fn name(&self) -> &'static str;

    /// Reject operands the operator cannot work with
    fn validate(&self, _operand: &Value) -> Result<()> {
        Ok(())
    }

    /// `doc_value` is `None` when the field does not exist
    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// $eq: structural equality, numbers compared by value
pub struct EqOperator;

impl OperatorMatcher for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        doc_value.map_or(false, |v| values_equal(v, operand))
    }
}

/// $ne: field exists and differs
pub struct NeOperator;

impl OperatorMatcher for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        doc_value.map_or(false, |v| !values_equal(v, operand))
    }
}

/// $gt
pub struct GtOperator;

impl OperatorMatcher for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        require_ordered(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        compare_with_predicate(doc_value, operand, |ord| ord == Ordering::Greater)
    }
}

/// $gte
pub struct GteOperator;

impl OperatorMatcher for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        require_ordered(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        compare_with_predicate(doc_value, operand, |ord| ord != Ordering::Less)
    }
}

/// $lt
pub struct LtOperator;

impl OperatorMatcher for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        require_ordered(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        compare_with_predicate(doc_value, operand, |ord| ord == Ordering::Less)
    }
}

/// $lte
pub struct LteOperator;

impl OperatorMatcher for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        require_ordered(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        compare_with_predicate(doc_value, operand, |ord| ord != Ordering::Greater)
    }
}

// ============================================================================
// MEMBERSHIP OPERATORS
// ============================================================================

/// $in: field equals one of the listed values
pub struct InOperator;

impl OperatorMatcher for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        require_array(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        match (doc_value, operand) {
            (Some(v), Value::Array(candidates)) => candidates.iter().any(|c| values_equal(v, c)),
            _ => false,
        }
    }
}

/// $nin: field exists and equals none of the listed values
pub struct NinOperator;

impl OperatorMatcher for NinOperator {
    fn name(&self) -> &'static str {
        "$nin"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        require_array(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> bool {
        match (doc_value, operand) {
            (Some(v), Value::Array(candidates)) => !candidates.iter().any(|c| values_equal(v, c)),
            _ => false,
        }
    }
}

// ============================================================================
// OPERATOR REGISTRY
// ============================================================================

lazy_static! {
    /// Global registry of field operators, keyed by name
    ///
    /// Initialized once and immutable afterwards. `$and` and `$or` are not
    /// field operators; the condition parser handles them.
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn OperatorMatcher>> = {
        let mut registry: HashMap<&'static str, Box<dyn OperatorMatcher>> = HashMap::new();

        // Comparison operators
        registry.insert("$eq", Box::new(EqOperator));
        registry.insert("$ne", Box::new(NeOperator));
        registry.insert("$gt", Box::new(GtOperator));
        registry.insert("$gte", Box::new(GteOperator));
        registry.insert("$lt", Box::new(LtOperator));
        registry.insert("$lte", Box::new(LteOperator));

        // Membership operators
        registry.insert("$in", Box::new(InOperator));
        registry.insert("$nin", Box::new(NinOperator));

        registry
    };
}

/// Registry lookup with a `ParseError` for unknown names
pub fn lookup_operator(name: &str) -> Result<&'static dyn OperatorMatcher> {
    let registry: &'static HashMap<&'static str, Box<dyn OperatorMatcher>> = &OPERATOR_REGISTRY;
    registry
        .get(name)
        .map(|op| op.as_ref())
        .ok_or_else(|| HonoError::Parse(format!("Unknown operator: {}", name)))
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Shared body of $gt, $gte, $lt, $lte. Incomparable types never match.
fn compare_with_predicate<F>(doc_value: Option<&Value>, operand: &Value, predicate: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    doc_value
        .and_then(|v| compare_values(v, operand))
        .map_or(false, predicate)
}

fn require_ordered(op: &str, operand: &Value) -> Result<()> {
    match operand {
        Value::Number(_) | Value::String(_) => Ok(()),
        other => Err(HonoError::Parse(format!(
            "{} needs a number or a string, got {}",
            op,
            type_name(other)
        ))),
    }
}

fn require_array(op: &str, operand: &Value) -> Result<()> {
    match operand {
        Value::Array(_) => Ok(()),
        other => Err(HonoError::Parse(format!(
            "{} needs an array, got {}",
            op,
            type_name(other)
        ))),
    }
}
