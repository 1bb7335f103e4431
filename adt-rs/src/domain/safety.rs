use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{AdtError, Result};

/// Operation classes, one per tool category. The single-letter forms are the
/// configuration surface (`allowed-ops=RSQ`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationClass {
    Read,
    Search,
    Query,
    FreeSql,
    Create,
    Update,
    Delete,
    Activate,
    Test,
    Lock,
    Intelligence,
    Workflow,
    Transport,
}

impl OperationClass {
    pub fn letter(&self) -> char {
        match self {
            OperationClass::Read => 'R',
            OperationClass::Search => 'S',
            OperationClass::Query => 'Q',
            OperationClass::FreeSql => 'F',
            OperationClass::Create => 'C',
            OperationClass::Update => 'U',
            OperationClass::Delete => 'D',
            OperationClass::Activate => 'A',
            OperationClass::Test => 'T',
            OperationClass::Lock => 'L',
            OperationClass::Intelligence => 'I',
            OperationClass::Workflow => 'W',
            OperationClass::Transport => 'X',
        }
    }

    pub fn from_letter(letter: char) -> Result<OperationClass> {
        let class = match letter.to_ascii_uppercase() {
            'R' => OperationClass::Read,
            'S' => OperationClass::Search,
            'Q' => OperationClass::Query,
            'F' => OperationClass::FreeSql,
            'C' => OperationClass::Create,
            'U' => OperationClass::Update,
            'D' => OperationClass::Delete,
            'A' => OperationClass::Activate,
            'T' => OperationClass::Test,
            'L' => OperationClass::Lock,
            'I' => OperationClass::Intelligence,
            'W' => OperationClass::Workflow,
            'X' => OperationClass::Transport,
            other => {
                return Err(AdtError::InvalidArgument(format!(
                    "unknown operation class '{other}'"
                )))
            }
        };
        Ok(class)
    }

    /// Parse a letter string like `"RSQTI"` into a set.
    pub fn parse_set(letters: &str) -> Result<BTreeSet<OperationClass>> {
        letters
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(OperationClass::from_letter)
            .collect()
    }

    /// Write-class operations are the ones read-only mode denies.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            OperationClass::Create
                | OperationClass::Update
                | OperationClass::Delete
                | OperationClass::Activate
                | OperationClass::Workflow
        )
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// The safety gate. Immutable after construction; evaluated before any
/// network I/O on every operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Deny all write-class operations.
    pub read_only: bool,
    /// Deny the FreeSql class (arbitrary SELECTs via data preview).
    pub block_free_sql: bool,
    /// Whitelist of operation classes; empty = all allowed.
    pub allowed_ops: BTreeSet<OperationClass>,
    /// Blacklist of operation classes; takes precedence over the whitelist.
    pub disallowed_ops: BTreeSet<OperationClass>,
    /// Package patterns, exact or suffix-`*` wildcard; empty = all allowed.
    pub allowed_packages: Vec<String>,
    /// Transport operations require this explicit opt-in.
    pub enable_transports: bool,
    /// Allow only read operations on transports (list, get).
    pub transport_read_only: bool,
    /// Transport number patterns, exact or suffix-`*`; empty = all allowed.
    pub allowed_transports: Vec<String>,
    /// Mutations against transportable (non-`$*`) packages need this flag.
    pub allow_transportable_edits: bool,
    /// Evaluate checks but short-circuit before any network side effect.
    pub dry_run: bool,
}

impl SafetyPolicy {
    /// Everything allowed. The facade applies explicit configuration on top.
    pub fn unrestricted() -> Self {
        SafetyPolicy::default()
    }

    /// Read-only default: reads, searches, queries, tests and code
    /// intelligence only.
    pub fn read_only_default() -> Self {
        SafetyPolicy {
            read_only: true,
            block_free_sql: true,
            allowed_ops: [
                OperationClass::Read,
                OperationClass::Search,
                OperationClass::Query,
                OperationClass::Test,
                OperationClass::Intelligence,
            ]
            .into_iter()
            .collect(),
            ..SafetyPolicy::default()
        }
    }

    /// Evaluate the operation-class rules in fixed order. Returns the first
    /// failing rule as `blocked-by-policy`.
    pub fn check_operation(&self, op: OperationClass, op_name: &str) -> Result<()> {
        if self.read_only && op.is_write() {
            return Err(AdtError::BlockedByPolicy(format!(
                "operation '{op_name}' (class {op}) denied: read-only mode"
            )));
        }
        if self.block_free_sql && op == OperationClass::FreeSql {
            return Err(AdtError::BlockedByPolicy(format!(
                "operation '{op_name}' denied: free SQL is blocked"
            )));
        }
        if op == OperationClass::Transport && !self.enable_transports {
            return Err(AdtError::BlockedByPolicy(format!(
                "operation '{op_name}' denied: transports not enabled (set enable-transports)"
            )));
        }
        if self.disallowed_ops.contains(&op) {
            return Err(AdtError::BlockedByPolicy(format!(
                "operation '{op_name}' (class {op}) denied: class is disallowed"
            )));
        }
        if !self.allowed_ops.is_empty() && !self.allowed_ops.contains(&op) {
            return Err(AdtError::BlockedByPolicy(format!(
                "operation '{op_name}' (class {op}) denied: not in allowed classes"
            )));
        }
        Ok(())
    }

    pub fn is_package_allowed(&self, package: &str) -> bool {
        if self.allowed_packages.is_empty() {
            return true;
        }
        let package = package.to_uppercase();
        self.allowed_packages
            .iter()
            .any(|pattern| pattern_matches(&pattern.to_uppercase(), &package))
    }

    pub fn check_package(&self, package: &str) -> Result<()> {
        if !self.is_package_allowed(package) {
            return Err(AdtError::BlockedByPolicy(format!(
                "package '{package}' denied (allowed: {})",
                self.allowed_packages.join(", ")
            )));
        }
        Ok(())
    }

    /// Guard for any mutation that names a package: the package allow-list
    /// AND the transportable-edit rule both must pass (the stricter rule
    /// applies). Local packages are the `$*` ones.
    pub fn check_mutation_target(&self, package: &str) -> Result<()> {
        self.check_package(package)?;
        if !package.starts_with('$') && !self.allow_transportable_edits {
            return Err(AdtError::BlockedByPolicy(format!(
                "package '{package}' is transportable; set allow-transportable-edits to modify it"
            )));
        }
        Ok(())
    }

    pub fn is_transport_allowed(&self, transport: &str) -> bool {
        if self.allowed_transports.is_empty() {
            return true;
        }
        let transport = transport.to_uppercase();
        self.allowed_transports
            .iter()
            .any(|pattern| pattern_matches(&pattern.to_uppercase(), &transport))
    }

    /// Transport-scope check. `transport` may be empty for list operations.
    pub fn check_transport(&self, transport: &str, op_name: &str, is_write: bool) -> Result<()> {
        if !self.enable_transports {
            return Err(AdtError::BlockedByPolicy(format!(
                "transport operation '{op_name}' denied: transports not enabled (set enable-transports)"
            )));
        }
        if is_write && self.transport_read_only {
            return Err(AdtError::BlockedByPolicy(format!(
                "transport operation '{op_name}' denied: transport-read-only mode"
            )));
        }
        if !transport.is_empty() && !self.is_transport_allowed(transport) {
            return Err(AdtError::BlockedByPolicy(format!(
                "transport '{transport}' denied (allowed: {})",
                self.allowed_transports.join(", ")
            )));
        }
        Ok(())
    }
}

/// Exact match or suffix-`*` wildcard. Both sides uppercased by the callers.
fn pattern_matches(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_blocks_write_classes() {
        let policy = SafetyPolicy {
            read_only: true,
            ..SafetyPolicy::default()
        };
        for op in [
            OperationClass::Create,
            OperationClass::Update,
            OperationClass::Delete,
            OperationClass::Activate,
            OperationClass::Workflow,
        ] {
            assert_eq!(
                policy.check_operation(op, "t").unwrap_err().code(),
                "blocked-by-policy"
            );
        }
        assert!(policy.check_operation(OperationClass::Read, "t").is_ok());
        assert!(policy.check_operation(OperationClass::Lock, "t").is_ok());
    }

    #[test]
    fn free_sql_gate() {
        let policy = SafetyPolicy {
            block_free_sql: true,
            ..SafetyPolicy::default()
        };
        assert!(policy
            .check_operation(OperationClass::FreeSql, "RunQuery")
            .is_err());
        assert!(policy
            .check_operation(OperationClass::Query, "GetTableContents")
            .is_ok());
    }

    #[test]
    fn transports_require_opt_in() {
        let policy = SafetyPolicy::default();
        assert!(policy
            .check_operation(OperationClass::Transport, "ListTransports")
            .is_err());
        assert!(policy.check_transport("", "ListTransports", false).is_err());

        let enabled = SafetyPolicy {
            enable_transports: true,
            ..SafetyPolicy::default()
        };
        assert!(enabled
            .check_operation(OperationClass::Transport, "ListTransports")
            .is_ok());
    }

    #[test]
    fn transport_read_only_blocks_writes_before_anything_else() {
        let policy = SafetyPolicy {
            enable_transports: true,
            transport_read_only: true,
            ..SafetyPolicy::default()
        };
        assert!(policy.check_transport("", "ListTransports", false).is_ok());
        let err = policy
            .check_transport("", "CreateTransport", true)
            .unwrap_err();
        assert!(err.to_string().contains("transport-read-only"));
    }

    #[test]
    fn transport_patterns() {
        let policy = SafetyPolicy {
            enable_transports: true,
            allowed_transports: vec!["A4HK*".into(), "DEVK900001".into()],
            ..SafetyPolicy::default()
        };
        assert!(policy.check_transport("A4HK900110", "Release", true).is_ok());
        assert!(policy.check_transport("DEVK900001", "Release", true).is_ok());
        assert!(policy.check_transport("DEVK900002", "Release", true).is_err());
    }

    #[test]
    fn deny_list_beats_allow_list() {
        let policy = SafetyPolicy {
            allowed_ops: OperationClass::parse_set("RC").unwrap(),
            disallowed_ops: OperationClass::parse_set("C").unwrap(),
            ..SafetyPolicy::default()
        };
        assert!(policy.check_operation(OperationClass::Create, "t").is_err());
        assert!(policy.check_operation(OperationClass::Read, "t").is_ok());
        assert!(policy.check_operation(OperationClass::Update, "t").is_err());
    }

    #[test]
    fn package_patterns() {
        let policy = SafetyPolicy {
            allowed_packages: vec!["$TMP".into(), "Z*".into()],
            ..SafetyPolicy::default()
        };
        assert!(policy.is_package_allowed("$TMP"));
        assert!(policy.is_package_allowed("ztest"));
        assert!(policy.is_package_allowed("ZRAY"));
        assert!(!policy.is_package_allowed("$ZGIT"));
        assert!(!policy.is_package_allowed("YDEMO"));

        let open = SafetyPolicy::default();
        assert!(open.is_package_allowed("ANYTHING"));
    }

    #[test]
    fn transportable_edit_guard_is_the_stricter_rule() {
        // Either rule failing denies.
        let policy = SafetyPolicy {
            allowed_packages: vec!["Z*".into()],
            allow_transportable_edits: false,
            ..SafetyPolicy::default()
        };
        // Package allowed by pattern but transportable: denied.
        let err = policy.check_mutation_target("ZPKG").unwrap_err();
        assert!(err.to_string().contains("allow-transportable-edits"));
        // Local package not in the allow-list: denied by the list.
        assert!(policy.check_mutation_target("$TMP").is_err());

        let permissive = SafetyPolicy {
            allow_transportable_edits: true,
            ..SafetyPolicy::default()
        };
        assert!(permissive.check_mutation_target("ZPKG").is_ok());
        assert!(permissive.check_mutation_target("$TMP").is_ok());
    }

    #[test]
    fn parse_set_round_trips() {
        let set = OperationClass::parse_set("RSQTI").unwrap();
        assert_eq!(set.len(), 5);
        assert!(set.contains(&OperationClass::Intelligence));
        assert!(OperationClass::parse_set("Z").is_err());
    }
}
