pub mod mirror;
pub mod watcher;
