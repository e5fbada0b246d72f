//! Utility functions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version information for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Deployment identifier: second-resolution start time plus process id
pub fn deployment_id(started_at: DateTime<Utc>, pid: u32) -> String {
    format!("{}_{}", started_at.format("%Y%m%d_%H%M%S"), pid)
}

/// Fixed-width timestamp for backup names, so name order is time order
pub fn backup_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// True if `s` looks like a `backup_timestamp` value
pub fn is_backup_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() < 22 {
        return false;
    }
    bytes[..22].iter().enumerate().all(|(i, b)| match i {
        8 | 15 => *b == b'_',
        _ => b.is_ascii_digit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deployment_id() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(deployment_id(at, 4242), "20250309_140507_4242");
    }

    #[test]
    fn test_backup_timestamp_is_fixed_width() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        let stamp = backup_timestamp(at);
        assert_eq!(stamp, "20250309_140507_000000");
        assert!(is_backup_timestamp(&stamp));
        assert!(is_backup_timestamp(&format!("{}_1", stamp)));
        assert!(!is_backup_timestamp("old_20250309"));
    }
}
