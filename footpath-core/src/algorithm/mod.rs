pub mod projection;
pub mod reachable;
pub mod search;
pub mod shortest_path;
pub mod shortest_path_tree;
