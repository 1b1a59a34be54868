use serde_json::Value as JsonValue;

/// a single free-form edge or node attribute. input features carry
/// arbitrary JSON properties; each one is held in its observed type so that
/// the storage layer can infer a stable column type on first sight.
///
/// `Null` is distinct from absence: an absent key was never observed, while
/// `Null` overwrites a stored value with SQL NULL on update.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl AttrValue {
    /// numeric view of the value. booleans and text are not numbers; a null
    /// is an absent number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// the value multiplied by -1, for sign-changing attributes on reverse
    /// edges. non-numeric values are returned unchanged.
    pub fn negated(&self) -> AttrValue {
        match self {
            AttrValue::Int(i) => AttrValue::Int(-i),
            AttrValue::Float(f) => AttrValue::Float(-f),
            other => other.clone(),
        }
    }

    /// the truthiness-toggled value, for flip attributes on reverse edges.
    /// integers toggle between 0 and 1; non-boolean-like values are
    /// returned unchanged.
    pub fn toggled(&self) -> AttrValue {
        match self {
            AttrValue::Bool(b) => AttrValue::Bool(!b),
            AttrValue::Int(i) => AttrValue::Int(if *i == 0 { 1 } else { 0 }),
            other => other.clone(),
        }
    }

    /// the SQL column type used when this value is the first observed for a
    /// new attribute key. a leading null types its column DOUBLE so that
    /// precomputed weights whose first value is null still get a numeric
    /// column.
    pub fn sql_type(&self) -> &'static str {
        match self {
            AttrValue::Int(_) | AttrValue::Bool(_) => "INTEGER",
            AttrValue::Float(_) => "DOUBLE",
            AttrValue::Text(_) => "TEXT",
            AttrValue::Null => "DOUBLE",
        }
    }
}

impl From<&AttrValue> for JsonValue {
    fn from(value: &AttrValue) -> JsonValue {
        match value {
            AttrValue::Int(i) => JsonValue::from(*i),
            AttrValue::Float(f) => JsonValue::from(*f),
            AttrValue::Text(t) => JsonValue::from(t.clone()),
            AttrValue::Bool(b) => JsonValue::from(*b),
            AttrValue::Null => JsonValue::Null,
        }
    }
}

impl TryFrom<&JsonValue> for AttrValue {
    type Error = String;

    fn try_from(value: &JsonValue) -> Result<AttrValue, String> {
        match value {
            JsonValue::Null => Ok(AttrValue::Null),
            JsonValue::Bool(b) => Ok(AttrValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(AttrValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(AttrValue::Float(f))
                } else {
                    Err(format!("unrepresentable number: {}", n))
                }
            }
            JsonValue::String(s) => Ok(AttrValue::Text(s.clone())),
            other => Err(format!("unsupported attribute value: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negated() {
        assert_eq!(AttrValue::Float(0.1).negated(), AttrValue::Float(-0.1));
        assert_eq!(AttrValue::Int(3).negated(), AttrValue::Int(-3));
        assert_eq!(
            AttrValue::Text("sidewalk".to_string()).negated(),
            AttrValue::Text("sidewalk".to_string())
        );
    }

    #[test]
    fn test_toggled() {
        assert_eq!(AttrValue::Bool(true).toggled(), AttrValue::Bool(false));
        assert_eq!(AttrValue::Int(0).toggled(), AttrValue::Int(1));
        assert_eq!(AttrValue::Int(1).toggled(), AttrValue::Int(0));
        assert_eq!(
            AttrValue::Float(0.4).toggled(),
            AttrValue::Float(0.4),
            "floats are not boolean-like"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let values = vec![
            AttrValue::Int(42),
            AttrValue::Float(0.25),
            AttrValue::Text("crossing".to_string()),
            AttrValue::Bool(false),
            AttrValue::Null,
        ];
        for v in values {
            let json = JsonValue::from(&v);
            let back = AttrValue::try_from(&json).unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn test_sql_type_inference() {
        assert_eq!(AttrValue::Int(1).sql_type(), "INTEGER");
        assert_eq!(AttrValue::Bool(true).sql_type(), "INTEGER");
        assert_eq!(AttrValue::Float(1.5).sql_type(), "DOUBLE");
        assert_eq!(AttrValue::Text("x".to_string()).sql_type(), "TEXT");
        assert_eq!(AttrValue::Null.sql_type(), "DOUBLE");
    }
}
