pub mod config;
pub mod io;
pub mod itemknn;
pub mod metrics;
pub mod reshape;
pub mod split;
pub mod stopwatch;
