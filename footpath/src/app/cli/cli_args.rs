use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a routable GeoPackage (graph.gpkg in the project directory)
    /// from the data in the project's `layers` directory.
    Build {
        project_directory: PathBuf,

        /// Coordinate rounding precision deciding whether dataset
        /// polylines are connected.
        #[arg(long, default_value_t = 7)]
        precision: u32,

        /// A property whose sign should be flipped when reversing an edge,
        /// e.g. an incline field. May be given multiple times.
        #[arg(long = "changes-sign")]
        changes_sign: Vec<String>,
    },
    /// Precalculate static weights for all profiles flagged for
    /// precomputation.
    Weight { project_directory: PathBuf },
    /// Run a web server answering shortest-path, shortest-path-tree, and
    /// reachable-tree queries for every profile in a project.
    Serve {
        project_directory: PathBuf,

        /// Host on which to run the server.
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Port on which to run the server.
        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// Include error details in responses.
        #[arg(long)]
        debug: bool,
    },
}
