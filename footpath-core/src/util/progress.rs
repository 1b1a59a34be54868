use kdam::{Bar, BarBuilder};

/// environment variable used to denote if the progress bar should be used.
/// if FOOTPATH_PROGRESS=false, the bar is deactivated, otherwise it runs.
const FOOTPATH_PROGRESS: &str = "FOOTPATH_PROGRESS";

/// helper function for building a progress bar.
/// a progress bar is created only if:
///   - the logging system is set to DEBUG or INFO
///   - the FOOTPATH_PROGRESS environment variable is not set to "false"
pub fn build_progress_bar(progress: BarBuilder) -> Option<Bar> {
    let progress_disabled = std::env::var(FOOTPATH_PROGRESS)
        .ok()
        .map(|v| v.to_lowercase() == "false")
        .unwrap_or_default();
    let log_info_enabled = log::log_enabled!(log::Level::Info);
    if !progress_disabled && log_info_enabled {
        progress.build().ok()
    } else {
        None
    }
}
