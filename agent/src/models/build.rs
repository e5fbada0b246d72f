//! Build outcome

use std::path::PathBuf;
use std::time::Duration;

/// Outcome of one build pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub success: bool,

    /// Ready-to-serve artifact directory. For containerized builds this is the
    /// compose working directory, the artifact itself being the images.
    pub output_dir: PathBuf,

    pub duration: Duration,

    /// Entry file found in the output, for services the supervisor starts directly
    pub entry: Option<PathBuf>,

    pub failure: Option<String>,
}

impl BuildResult {
    pub fn succeeded(output_dir: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            success: true,
            output_dir: output_dir.into(),
            duration,
            entry: None,
            failure: None,
        }
    }

    pub fn with_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.entry = Some(entry.into());
        self
    }
}
