use serde::Deserialize;

use super::profile_error::ProfileError;
use crate::model::network::AttrValue;

/// a typed routing argument declared by a profile. request parameters are
/// parsed through the declared type before reaching the cost function.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileArg {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Float,
    Int,
    Bool,
    Str,
}

impl ProfileArg {
    pub fn parse(&self, raw: &str) -> Result<AttrValue, ProfileError> {
        let invalid = || ProfileError::InvalidArgValue {
            name: self.name.clone(),
            value: raw.to_string(),
        };
        match self.arg_type {
            ArgType::Float => raw.parse::<f64>().map(AttrValue::Float).map_err(|_| invalid()),
            ArgType::Int => raw.parse::<i64>().map(AttrValue::Int).map_err(|_| invalid()),
            ArgType::Bool => match raw {
                "true" | "1" => Ok(AttrValue::Bool(true)),
                "false" | "0" => Ok(AttrValue::Bool(false)),
                _ => Err(invalid()),
            },
            ArgType::Str => Ok(AttrValue::Text(raw.to_string())),
        }
    }
}
