//! Scan options shared by local and remote drivers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which package sources vulnerabilities are reported for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnType {
    Os,
    Library,
}

impl VulnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Os => "os",
            Self::Library => "library",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "os" => Some(Self::Os),
            "library" => Some(Self::Library),
            _ => None,
        }
    }
}

impl fmt::Display for VulnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scanner families that can be switched on per scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityCheck {
    Vuln,
    Config,
    Secret,
    License,
}

impl SecurityCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vuln => "vuln",
            Self::Config => "config",
            Self::Secret => "secret",
            Self::License => "license",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vuln" => Some(Self::Vuln),
            "config" => Some(Self::Config),
            "secret" => Some(Self::Secret),
            "license" => Some(Self::License),
            _ => None,
        }
    }
}

impl fmt::Display for SecurityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options controlling what a driver reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub vuln_type: Vec<VulnType>,
    pub security_checks: Vec<SecurityCheck>,
    /// Include packages without findings in results
    pub list_all_packages: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            vuln_type: vec![VulnType::Os, VulnType::Library],
            security_checks: vec![SecurityCheck::Vuln, SecurityCheck::Secret],
            list_all_packages: false,
        }
    }
}

impl ScanOptions {
    pub fn is_enabled(&self, check: SecurityCheck) -> bool {
        self.security_checks.contains(&check)
    }

    /// Whether vulnerabilities of the given package source are wanted
    pub fn wants_vulns(&self, vuln_type: VulnType) -> bool {
        self.is_enabled(SecurityCheck::Vuln) && self.vuln_type.contains(&vuln_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulns_need_both_check_and_type() {
        let options = ScanOptions {
            vuln_type: vec![VulnType::Library],
            security_checks: vec![SecurityCheck::Vuln],
            list_all_packages: false,
        };
        assert!(options.wants_vulns(VulnType::Library));
        assert!(!options.wants_vulns(VulnType::Os));

        let config_only = ScanOptions {
            security_checks: vec![SecurityCheck::Config],
            ..options
        };
        assert!(!config_only.wants_vulns(VulnType::Library));
    }

    #[test]
    fn parse_names() {
        assert_eq!(SecurityCheck::parse("secret"), Some(SecurityCheck::Secret));
        assert_eq!(SecurityCheck::parse("rbac"), None);
        assert_eq!(VulnType::parse("os"), Some(VulnType::Os));
    }
}
