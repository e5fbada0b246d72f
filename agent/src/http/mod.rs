//! HTTP health probing

pub mod probe;
#[cfg(test)]
pub(crate) mod testing;

pub use probe::{HttpProbe, ReqwestProbe};
