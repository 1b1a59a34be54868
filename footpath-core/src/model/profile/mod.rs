pub mod cost_model;
pub mod interpretation;
pub mod profile;
pub mod profile_arg;
pub mod profile_error;
pub mod static_weight;

pub use cost_model::{CompiledCost, CostDescriptor, CostFunction, DistanceCost, StaticWeightCost};
pub use interpretation::{status_document, DefaultInterpretation, Interpretation, QueryStatus};
pub use profile::{parse_profiles, Profile};
pub use profile_arg::{ArgType, ProfileArg};
pub use profile_error::ProfileError;
pub use static_weight::{precalculate_weight, precalculate_weights, WEIGHT_BATCH_SIZE};
