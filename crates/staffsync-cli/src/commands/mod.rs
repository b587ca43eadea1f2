pub mod add;
pub mod common;
pub mod config;
pub mod conflicts;
pub mod list;
pub mod stats;
pub mod sync;
