pub mod app;
pub mod cache;
pub mod config;
pub mod driver;
pub mod fetch;
pub mod input;
pub mod pipeline;
pub mod shared;
pub mod steps;
pub mod ui;
pub mod vmx;
