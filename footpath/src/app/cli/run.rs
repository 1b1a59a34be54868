use kdam::{Bar, BarExt};
use log::info;

use footpath_core::build::{build_graph, count_layer_features, get_layers_paths};
use footpath_core::model::profile::{parse_profiles, precalculate_weights};
use footpath_core::storage::{GraphStore, GRAPH_FILE_NAME};
use footpath_core::util::progress::build_progress_bar;

use super::app_error::AppError;
use super::cli_args::{CliArgs, Command};
use crate::app::server;

pub fn command_line_runner(args: &CliArgs) -> Result<(), AppError> {
    match &args.command {
        Command::Build {
            project_directory,
            precision,
            changes_sign,
        } => {
            info!("estimating feature count");
            let layer_paths = get_layers_paths(project_directory)?;
            let mut n = 0;
            for path in &layer_paths {
                n += count_layer_features(path)?;
            }
            // two directed edges per feature
            n *= 2;
            info!("creating {} edges from {} features", n, n / 2);

            let mut bar = build_progress_bar(
                Bar::builder().total(n).desc("importing features"),
            );
            let mut counter = |added: usize| {
                if let Some(bar) = bar.as_mut() {
                    let _ = bar.update(added);
                }
            };
            let store = build_graph(
                project_directory,
                *precision,
                changes_sign.clone(),
                Some(&mut counter),
            )?;
            info!(
                "built graph with {} edges and {} nodes",
                store.size()?,
                store.node_count()?
            );
            Ok(())
        }
        Command::Weight { project_directory } => {
            info!("collecting data for static weighting");
            let profiles = parse_profiles(project_directory)?;
            let mut store = GraphStore::open(project_directory.join(GRAPH_FILE_NAME))?;

            let n_profiles = profiles.iter().filter(|p| p.precalculate).count();
            let total = store.size()? * n_profiles;
            let mut bar = build_progress_bar(
                Bar::builder().total(total).desc("computing static weights"),
            );
            let mut counter = |updated: usize| {
                if let Some(bar) = bar.as_mut() {
                    let _ = bar.update(updated);
                }
            };
            precalculate_weights(&mut store, &profiles, Some(&mut counter))?;
            Ok(())
        }
        Command::Serve {
            project_directory,
            host,
            port,
            debug,
        } => {
            info!("starting server in {}", project_directory.display());
            server::run_server(project_directory, host, *port, *debug)
        }
    }
}
