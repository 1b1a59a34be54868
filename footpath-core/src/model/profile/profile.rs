use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::cost_model::{CostDescriptor, CostFunction, DistanceCost, StaticWeightCost};
use super::interpretation::{DefaultInterpretation, Interpretation};
use super::profile_arg::ProfileArg;
use super::profile_error::ProfileError;
use crate::model::network::{AttrValue, WEIGHT_COLUMN_PREFIX};

/// the on-disk shape of a `profile-*.json` descriptor.
#[derive(Debug, Deserialize)]
struct ProfileDescriptor {
    id: String,
    name: String,
    #[serde(default)]
    args: Vec<ProfileArg>,
    #[serde(default, rename = "static")]
    static_defaults: JsonMap<String, JsonValue>,
    #[serde(default)]
    precalculate: bool,
    #[serde(default)]
    cost_function: Option<String>,
    #[serde(default)]
    shortest_path: Option<String>,
    #[serde(default)]
    shortest_path_tree: Option<String>,
    #[serde(default)]
    reachable_tree: Option<String>,
}

/// a user-defined routing profile: a URL-safe id, typed request arguments,
/// static defaults, an optional declarative cost descriptor, and response
/// interpretation routines (defaulted when not customized).
pub struct Profile {
    pub id: String,
    pub name: String,
    pub args: Vec<ProfileArg>,
    pub static_defaults: IndexMap<String, AttrValue>,
    pub precalculate: bool,
    cost_descriptor: Option<CostDescriptor>,
    interpretation: Box<dyn Interpretation>,
}

impl Profile {
    /// parse a profile descriptor. a referenced cost descriptor file is
    /// loaded relative to the descriptor's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Profile, ProfileError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let descriptor: ProfileDescriptor = serde_json::from_str(&raw)?;

        if descriptor.id.is_empty()
            || !descriptor
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ProfileError::InvalidDescriptor(format!(
                "profile id is not URL-safe: {:?}",
                descriptor.id
            )));
        }

        let working_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let cost_descriptor = match &descriptor.cost_function {
            Some(relpath) => {
                let cost_raw = fs::read_to_string(working_dir.join(relpath))?;
                Some(serde_json::from_str::<CostDescriptor>(&cost_raw)?)
            }
            None => None,
        };

        // interpretation routines are an integration seam, not a code
        // loader: a descriptor naming custom ones keeps the defaults until
        // the embedding application installs an implementation.
        for (key, value) in [
            ("shortest_path", &descriptor.shortest_path),
            ("shortest_path_tree", &descriptor.shortest_path_tree),
            ("reachable_tree", &descriptor.reachable_tree),
        ] {
            if value.is_some() {
                log::warn!(
                    "profile {}: custom {} interpretation is not loadable from a file; using the default",
                    descriptor.id,
                    key
                );
            }
        }

        let mut static_defaults = IndexMap::new();
        for (key, value) in &descriptor.static_defaults {
            let attr = AttrValue::try_from(value)
                .map_err(|e| ProfileError::InvalidDescriptor(format!("static.{}: {}", key, e)))?;
            static_defaults.insert(key.clone(), attr);
        }

        Ok(Profile {
            id: descriptor.id,
            name: descriptor.name,
            args: descriptor.args,
            static_defaults,
            precalculate: descriptor.precalculate,
            cost_descriptor,
            interpretation: Box::new(DefaultInterpretation),
        })
    }

    /// replace the response interpretation routines.
    pub fn with_interpretation(mut self, interpretation: Box<dyn Interpretation>) -> Profile {
        self.interpretation = interpretation;
        self
    }

    pub fn interpretation(&self) -> &dyn Interpretation {
        self.interpretation.as_ref()
    }

    /// the reserved column this profile's static weights live in.
    pub fn weight_column(&self) -> String {
        format!("{}{}", WEIGHT_COLUMN_PREFIX, self.id)
    }

    /// parse raw request parameters through the declared argument types.
    /// undeclared parameters are ignored; absent declared arguments fall
    /// back to static defaults at compile time.
    pub fn parse_args<'a, I>(&self, raw: I) -> Result<IndexMap<String, AttrValue>, ProfileError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let raw: IndexMap<&String, &String> = raw.into_iter().collect();
        let mut parsed = IndexMap::new();
        for arg in &self.args {
            if let Some(value) = raw.get(&arg.name) {
                parsed.insert(arg.name.clone(), arg.parse(value)?);
            }
        }
        Ok(parsed)
    }

    /// produce the per-request cost function: the declarative descriptor
    /// compiled against static defaults overlaid with the request
    /// arguments, or the plain length lookup when no descriptor was given.
    pub fn cost_function(
        &self,
        request_args: &IndexMap<String, AttrValue>,
    ) -> Result<Box<dyn CostFunction>, ProfileError> {
        match &self.cost_descriptor {
            Some(descriptor) => {
                let mut merged = self.static_defaults.clone();
                for (key, value) in request_args {
                    merged.insert(key.clone(), value.clone());
                }
                Ok(Box::new(descriptor.compile(&merged)?))
            }
            None => Ok(Box::new(DistanceCost)),
        }
    }

    /// the precomputed-column shortcut for this profile.
    pub fn static_cost_function(&self) -> StaticWeightCost {
        StaticWeightCost::new(self.weight_column())
    }
}

/// parse every `profile-*.json` in a project directory, sorted by file
/// name for stable ordering.
pub fn parse_profiles<P: AsRef<Path>>(directory: P) -> Result<Vec<Profile>, ProfileError> {
    let mut paths: Vec<_> = fs::read_dir(directory.as_ref())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("profile-") && n.ends_with(".json"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    paths.iter().map(Profile::from_file).collect()
}
