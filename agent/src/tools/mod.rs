//! Wrappers around the external binaries a deployment drives

pub mod certbot;
pub mod compose;
pub mod git;
pub mod nginx;
pub mod npm;
pub mod pm2;
