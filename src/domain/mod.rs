pub mod classifier;
pub mod models;
pub mod relative_time;
