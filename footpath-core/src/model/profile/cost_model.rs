//! cost functions: the one contract serving both candidate filtering and
//! Dijkstra weighting. a cost function maps `(u, v, d)` to `Some(cost)` or
//! `None` for a non-traversable edge.
//!
//! user-defined costs are declarative: a profile references a JSON cost
//! descriptor that is compiled against the request's typed arguments into
//! a [`CompiledCost`].

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::profile_error::ProfileError;
use crate::model::network::{AttrValue, EdgeRecord};

pub trait CostFunction: Send + Sync {
    fn cost(&self, u: &str, v: &str, d: &EdgeRecord) -> Option<f64>;
}

/// the default cost: the edge's `length` attribute, non-traversable when
/// absent.
pub struct DistanceCost;

impl CostFunction for DistanceCost {
    fn cost(&self, _u: &str, _v: &str, d: &EdgeRecord) -> Option<f64> {
        d.length()
    }
}

/// precomputed-column shortcut: look up `_weight_<profile-id>` instead of
/// re-running the user function. a NULL (absent) column value is infinite
/// cost.
pub struct StaticWeightCost {
    column: String,
}

impl StaticWeightCost {
    pub fn new(column: impl Into<String>) -> StaticWeightCost {
        StaticWeightCost {
            column: column.into(),
        }
    }
}

impl CostFunction for StaticWeightCost {
    fn cost(&self, _u: &str, _v: &str, d: &EdgeRecord) -> Option<f64> {
        d.weight(&self.column)
    }
}

/// a threshold in a rule predicate: a literal number, or a reference to a
/// typed profile argument with an optional fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Value(f64),
    Arg {
        arg: String,
        #[serde(default)]
        default: Option<f64>,
    },
}

impl Threshold {
    fn resolve(&self, args: &IndexMap<String, AttrValue>) -> Result<f64, ProfileError> {
        match self {
            Threshold::Value(v) => Ok(*v),
            Threshold::Arg { arg, default } => match args.get(arg).and_then(|a| a.as_f64()) {
                Some(v) => Ok(v),
                None => default.ok_or_else(|| ProfileError::MissingArg(arg.clone())),
            },
        }
    }
}

/// predicate over one attribute value. all present conditions must hold.
#[derive(Debug, Clone, Deserialize)]
pub struct Predicate {
    #[serde(default)]
    pub equals: Option<JsonValue>,
    #[serde(default)]
    pub above: Option<Threshold>,
    #[serde(default)]
    pub below: Option<Threshold>,
    #[serde(default)]
    pub abs_above: Option<Threshold>,
    #[serde(default)]
    pub missing: Option<bool>,
}

/// what happens to the accumulated cost when a rule matches.
#[derive(Debug, Clone, Deserialize)]
pub struct Effect {
    #[serde(default)]
    pub impassable: bool,
    #[serde(default)]
    pub multiply: Option<f64>,
    #[serde(default)]
    pub add: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CostRule {
    pub attribute: String,
    pub when: Predicate,
    pub then: Effect,
}

/// a declarative cost descriptor, loaded from the file a profile's
/// `cost_function` key names.
#[derive(Debug, Clone, Deserialize)]
pub struct CostDescriptor {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub base_missing_is_zero: bool,
    #[serde(default)]
    pub rules: Vec<CostRule>,
}

impl CostDescriptor {
    /// resolve all argument references against the merged static defaults
    /// and request arguments, producing a ready-to-run cost function.
    pub fn compile(&self, args: &IndexMap<String, AttrValue>) -> Result<CompiledCost, ProfileError> {
        let rules = self
            .rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    attribute: rule.attribute.clone(),
                    equals: rule.when.equals.clone(),
                    above: rule.when.above.as_ref().map(|t| t.resolve(args)).transpose()?,
                    below: rule.when.below.as_ref().map(|t| t.resolve(args)).transpose()?,
                    abs_above: rule
                        .when
                        .abs_above
                        .as_ref()
                        .map(|t| t.resolve(args))
                        .transpose()?,
                    missing: rule.when.missing,
                    effect: rule.then.clone(),
                })
            })
            .collect::<Result<Vec<_>, ProfileError>>()?;
        Ok(CompiledCost {
            base: self.base.clone().unwrap_or_else(|| "length".to_string()),
            base_missing_is_zero: self.base_missing_is_zero,
            rules,
        })
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    attribute: String,
    equals: Option<JsonValue>,
    above: Option<f64>,
    below: Option<f64>,
    abs_above: Option<f64>,
    missing: Option<bool>,
    effect: Effect,
}

impl CompiledRule {
    fn matches(&self, value: Option<&AttrValue>) -> bool {
        if let Some(expect_missing) = self.missing {
            let is_missing = matches!(value, None | Some(AttrValue::Null));
            if is_missing != expect_missing {
                return false;
            }
            // a missing-value rule can only combine with `missing`
            if is_missing {
                return true;
            }
        }
        let value = match value {
            Some(v) => v,
            None => return false,
        };
        if let Some(expected) = &self.equals {
            if !attr_equals(value, expected) {
                return false;
            }
        }
        let number = value.as_f64();
        if let Some(threshold) = self.above {
            match number {
                Some(n) if n > threshold => {}
                _ => return false,
            }
        }
        if let Some(threshold) = self.below {
            match number {
                Some(n) if n < threshold => {}
                _ => return false,
            }
        }
        if let Some(threshold) = self.abs_above {
            match number {
                Some(n) if n.abs() > threshold => {}
                _ => return false,
            }
        }
        true
    }
}

/// compare an attribute to a descriptor literal, numerically when both
/// sides are numbers.
fn attr_equals(value: &AttrValue, expected: &JsonValue) -> bool {
    match (value, expected) {
        (AttrValue::Bool(b), JsonValue::Bool(e)) => b == e,
        (AttrValue::Text(t), JsonValue::String(e)) => t == e,
        (v, JsonValue::Number(e)) => match (v.as_f64(), e.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        // booleans stored as 0/1 integers compare against JSON booleans
        (AttrValue::Int(i), JsonValue::Bool(e)) => (*i != 0) == *e,
        _ => false,
    }
}

/// a cost descriptor with every argument reference resolved.
#[derive(Debug, Clone)]
pub struct CompiledCost {
    base: String,
    base_missing_is_zero: bool,
    rules: Vec<CompiledRule>,
}

impl CostFunction for CompiledCost {
    fn cost(&self, _u: &str, _v: &str, d: &EdgeRecord) -> Option<f64> {
        let mut acc = match d.get(&self.base).and_then(|v| v.as_f64()) {
            Some(v) => v,
            None => {
                if self.base_missing_is_zero {
                    0.0
                } else {
                    return None;
                }
            }
        };
        for rule in &self.rules {
            if rule.matches(d.get(&rule.attribute)) {
                if rule.effect.impassable {
                    return None;
                }
                if let Some(m) = rule.effect.multiply {
                    acc *= m;
                }
                if let Some(a) = rule.effect.add {
                    acc += a;
                }
            }
        }
        Some(acc)
    }
}
