pub mod config;
pub mod count;
pub mod demo;
