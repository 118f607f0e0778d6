use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tenant service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenantsConfig {
    /// Validity of the recovery link issued to invited users.
    #[serde(with = "tenant_db::serde_duration")]
    pub invitation_lifetime: Duration,
}

impl Default for TenantsConfig {
    fn default() -> Self {
        Self {
            invitation_lifetime: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn invitation_lifetime_defaults_to_one_day() {
        assert_eq!(
            TenantsConfig::default().invitation_lifetime,
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn invitation_lifetime_parses_humantime() {
        let cfg: TenantsConfig =
            serde_json::from_value(serde_json::json!({ "invitation_lifetime": "2h" })).unwrap();
        assert_eq!(cfg.invitation_lifetime, Duration::from_secs(7200));
    }
}
