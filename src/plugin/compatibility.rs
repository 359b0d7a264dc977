//! Version Compatibility Checker
//!
//! Validates the contract API version a plugin targets against the host's.

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::PluginInfo;
use crate::version;

/// Checker for plugin version compatibility
#[derive(Debug, Clone)]
pub struct VersionCompatibilityChecker {
    /// Current API version
    api_version: u32,
}

impl VersionCompatibilityChecker {
    /// Create a new version compatibility checker
    pub fn new(api_version: u32) -> Self {
        Self { api_version }
    }

    /// Check if a plugin API version is compatible
    pub fn is_api_compatible(&self, plugin_api_version: u32) -> bool {
        // Same major version (year) is compatible
        self.get_major_version(self.api_version) == self.get_major_version(plugin_api_version)
    }

    /// Get major version (year) from API version
    pub fn get_major_version(&self, api_version: u32) -> u32 {
        api_version / 10000
    }

    /// Check plugin compatibility
    pub fn check_plugin_compatibility(&self, plugin_info: &PluginInfo) -> PluginResult<()> {
        if !self.is_api_compatible(plugin_info.api_version) {
            return Err(PluginError::version_incompatible(format!(
                "Plugin '{}' requires API version {} but current version is {}",
                plugin_info.name,
                version::version_date_string(plugin_info.api_version),
                version::version_date_string(self.api_version)
            )));
        }
        Ok(())
    }
}

impl Default for VersionCompatibilityChecker {
    fn default() -> Self {
        Self::new(version::api_version())
    }
}
