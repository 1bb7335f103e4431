use serde::{Deserialize, Serialize};

/// Severities the ABAP check run and activation report: E(rror), W(arning),
/// I(nfo), A(bort), X (dump). E, A and X stop a workflow.
pub fn severity_is_error(severity: &str) -> bool {
    severity.chars().any(|c| matches!(c, 'E' | 'A' | 'X'))
}

/// One message from a syntax check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxDiagnostic {
    pub uri: String,
    pub line: u32,
    pub offset: u32,
    pub severity: String,
    pub text: String,
}

impl SyntaxDiagnostic {
    pub fn is_error(&self) -> bool {
        severity_is_error(&self.severity)
    }
}

/// Result of an activation request. Success means no E/A/X message *and* an
/// empty inactive set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivationResult {
    pub success: bool,
    pub messages: Vec<ActivationMessage>,
    pub inactive: Vec<InactiveObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationMessage {
    #[serde(default)]
    pub obj_descr: String,
    pub severity: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub href: String,
    pub text: String,
}

/// An object left inactive after activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactiveObject {
    pub uri: String,
    #[serde(default)]
    pub object_type: String,
    pub name: String,
    #[serde(default)]
    pub parent_uri: String,
}

/// Which risk levels and durations a unit test run includes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitTestFlags {
    pub harmless: bool,
    pub dangerous: bool,
    pub critical: bool,
    pub short: bool,
    pub medium: bool,
    pub long: bool,
}

impl Default for UnitTestFlags {
    fn default() -> Self {
        UnitTestFlags {
            harmless: true,
            dangerous: false,
            critical: false,
            short: true,
            medium: true,
            long: false,
        }
    }
}

/// Complete result of a unit test run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitTestResult {
    pub classes: Vec<UnitTestClass>,
}

impl UnitTestResult {
    /// True when no method (or class) carries a failedAssertion/exception
    /// alert.
    pub fn passed(&self) -> bool {
        self.classes.iter().all(|class| {
            class.alerts.iter().all(|a| a.kind == "warning")
                && class
                    .methods
                    .iter()
                    .all(|m| m.alerts.iter().all(|a| a.kind == "warning"))
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitTestClass {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub duration_category: String,
    #[serde(default)]
    pub risk_level: String,
    pub methods: Vec<UnitTestMethod>,
    pub alerts: Vec<UnitTestAlert>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitTestMethod {
    pub uri: String,
    pub name: String,
    /// Microseconds.
    pub execution_time: u64,
    pub alerts: Vec<UnitTestAlert>,
}

/// kind is one of failedAssertion, exception, warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitTestAlert {
    pub kind: String,
    pub severity: String,
    pub title: String,
    pub details: Vec<String>,
    pub stack: Vec<UnitTestStackEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitTestStackEntry {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_classification() {
        for sev in ["E", "A", "X"] {
            assert!(severity_is_error(sev), "{sev} should stop workflows");
        }
        for sev in ["W", "I", ""] {
            assert!(!severity_is_error(sev));
        }
    }

    #[test]
    fn unit_test_passed_ignores_warnings() {
        let mut result = UnitTestResult::default();
        result.classes.push(UnitTestClass {
            name: "LTC_DEMO".into(),
            methods: vec![UnitTestMethod {
                name: "CHECK_SUM".into(),
                alerts: vec![UnitTestAlert {
                    kind: "warning".into(),
                    severity: "tolerable".into(),
                    ..UnitTestAlert::default()
                }],
                ..UnitTestMethod::default()
            }],
            ..UnitTestClass::default()
        });
        assert!(result.passed());

        result.classes[0].methods[0].alerts.push(UnitTestAlert {
            kind: "failedAssertion".into(),
            severity: "critical".into(),
            ..UnitTestAlert::default()
        });
        assert!(!result.passed());
    }
}
