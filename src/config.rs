//! Licprobe configuration.

/// Names of the native modules the probe binds against.
///
/// The defaults are the production Windows modules. Overriding them is only
/// useful for side-by-side test installations of the licensing subsystem;
/// fake providers for unit tests are injected at the manager level instead.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Primary licensing provider module (modern servicing stack).
    pub primary_module: &'static str,

    /// Secondary licensing provider module (legacy client stack).
    /// Also the only module exporting the Windows-scoped queries.
    pub secondary_module: &'static str,

    /// Subscription state module (unrelated third backend).
    pub subscription_module: &'static str,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            primary_module: "sppc.dll",
            secondary_module: "slc.dll",
            subscription_module: "clipc.dll",
        }
    }
}

impl ProviderConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::LicprobeError> {
        if self.primary_module.is_empty() {
            return Err(crate::LicprobeError::ConfigError(
                "primary_module cannot be empty".to_string(),
            ));
        }
        if self.secondary_module.is_empty() {
            return Err(crate::LicprobeError::ConfigError(
                "secondary_module cannot be empty".to_string(),
            ));
        }
        if self.subscription_module.is_empty() {
            return Err(crate::LicprobeError::ConfigError(
                "subscription_module cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ProviderConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_module_name_is_rejected() {
        let config = ProviderConfig {
            primary_module: "",
            ..ProviderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(crate::LicprobeError::ConfigError(_))
        ));
    }
}
