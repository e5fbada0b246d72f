//! Deploy Agent Library
//!
//! Core modules for the single-host deployment agent.

pub mod app;
pub mod build;
pub mod deploy;
pub mod errors;
pub mod exec;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod storage;
pub mod tools;
pub mod utils;
