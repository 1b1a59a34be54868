use std::sync::{Arc, Mutex};

use footpath_core::model::profile::Profile;
use footpath_core::storage::GraphStore;

/// shared server state: the per-process graph handle (None when the store
/// could not be opened at startup, reported as `NoGraph` per request) and
/// the parsed profiles. the mutex encodes the single-connection ownership
/// of the store; each request holds it only for the duration of its query.
pub struct AppState {
    pub graph: Option<Mutex<GraphStore>>,
    pub profiles: Vec<Profile>,
    pub debug: bool,
}

pub type SharedState = Arc<AppState>;
