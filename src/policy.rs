//! Tool and shell-command restrictions handed to the external agent process.
//!
//! An agent's allowed tools and command patterns are read-only inputs: a
//! dispatch may narrow them per operation but never widen them. Asking for
//! anything outside the configured sets is a `PolicyViolation`.

use crate::error::{Result, RosterError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;

/// Tool name that receives command-pattern scoping.
pub const SHELL_TOOL: &str = "Bash";

/// Compiled allow/deny patterns for shell commands.
///
/// Patterns are globs matched against the whole command line (`git *`
/// matches `git push origin main`). Deny patterns are checked first.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allowed: Vec<String>,
    blocked: Vec<String>,
    allowed_set: GlobSet,
    blocked_set: GlobSet,
}

impl CommandPolicy {
    /// Compile the allow and deny lists, preserving their order.
    pub fn new(allowed: Vec<String>, blocked: Vec<String>) -> Result<Self> {
        let allowed_set = build_globset(&allowed, "allowed_commands")?;
        let blocked_set = build_globset(&blocked, "blocked_commands")?;
        Ok(Self {
            allowed,
            blocked,
            allowed_set,
            blocked_set,
        })
    }

    /// Whether `command` may be run under this policy.
    pub fn permits(&self, command: &str) -> bool {
        let command = command.trim();
        !self.blocked_set.is_match(command) && self.allowed_set.is_match(command)
    }

    /// Allowed patterns in configuration order.
    pub fn allowed_patterns(&self) -> &[String] {
        &self.allowed
    }

    /// Blocked patterns in configuration order.
    pub fn blocked_patterns(&self) -> &[String] {
        &self.blocked
    }
}

impl PartialEq for CommandPolicy {
    fn eq(&self, other: &Self) -> bool {
        self.allowed == other.allowed && self.blocked == other.blocked
    }
}

impl Eq for CommandPolicy {}

fn build_globset(patterns: &[String], field_name: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            RosterError::ConfigError(format!(
                "invalid pattern '{}' in {}: {}",
                pattern, field_name, e
            ))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RosterError::ConfigError(format!("failed to build {}: {}", field_name, e)))
}

/// The restriction set passed to one invocation of the external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restrictions {
    /// Tools the process may use.
    pub tools: BTreeSet<String>,
    /// Shell-command patterns the shell tool is scoped to.
    pub command_patterns: Vec<String>,
    /// Shell-command patterns that are always refused.
    pub blocked_patterns: Vec<String>,
}

impl Restrictions {
    /// Resolve the restriction set for one dispatch.
    ///
    /// With `requested == None` the agent's full tool set is used. Otherwise
    /// every requested tool must already be allowed.
    pub fn resolve(
        allowed_tools: &BTreeSet<String>,
        commands: &CommandPolicy,
        requested: Option<&[String]>,
    ) -> Result<Self> {
        let tools = match requested {
            None => allowed_tools.clone(),
            Some(requested) => {
                let outside: Vec<&str> = requested
                    .iter()
                    .filter(|t| !allowed_tools.contains(t.as_str()))
                    .map(String::as_str)
                    .collect();
                if !outside.is_empty() {
                    return Err(RosterError::PolicyViolation(format!(
                        "tool(s) {} are not in the allowed set [{}]",
                        outside.join(", "),
                        allowed_tools
                            .iter()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                }
                requested.iter().cloned().collect()
            }
        };

        Ok(Self {
            tools,
            command_patterns: commands.allowed_patterns().to_vec(),
            blocked_patterns: commands.blocked_patterns().to_vec(),
        })
    }

    /// Render the allow-list in the external CLI's tool syntax.
    ///
    /// The shell tool is expanded into one `Bash(<pattern>)` entry per
    /// allowed command pattern; with no patterns it is left out entirely so
    /// the process never gets an unscoped shell.
    pub fn allowed_tools_arg(&self) -> String {
        let mut entries = Vec::new();
        for tool in &self.tools {
            if tool == SHELL_TOOL {
                entries.extend(
                    self.command_patterns
                        .iter()
                        .map(|p| format!("{}({})", SHELL_TOOL, p)),
                );
            } else {
                entries.push(tool.clone());
            }
        }
        entries.join(",")
    }

    /// Render the deny-list in the external CLI's tool syntax.
    pub fn disallowed_tools_arg(&self) -> String {
        if !self.tools.contains(SHELL_TOOL) {
            return String::new();
        }
        self.blocked_patterns
            .iter()
            .map(|p| format!("{}({})", SHELL_TOOL, p))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn policy() -> CommandPolicy {
        CommandPolicy::new(
            strings(&["git *", "cargo *"]),
            strings(&["git push --force*", "rm -rf /"]),
        )
        .unwrap()
    }

    #[test]
    fn permits_matching_commands() {
        let policy = policy();
        assert!(policy.permits("git status"));
        assert!(policy.permits("git push origin main"));
        assert!(policy.permits("  cargo test --all  "));
        assert!(!policy.permits("npm install"));
        assert!(!policy.permits("gitk"));
    }

    #[test]
    fn blocked_patterns_take_precedence() {
        let policy = policy();
        assert!(!policy.permits("git push --force origin main"));
        assert!(!policy.permits("rm -rf /"));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = CommandPolicy::new(strings(&["git [*"]), vec![]).unwrap_err();
        assert!(matches!(err, RosterError::ConfigError(_)));
        assert!(err.to_string().contains("allowed_commands"));
    }

    #[test]
    fn resolve_defaults_to_full_tool_set() {
        let allowed: BTreeSet<String> = strings(&["Read", "Bash"]).into_iter().collect();
        let r = Restrictions::resolve(&allowed, &policy(), None).unwrap();
        assert_eq!(r.tools, allowed);
        assert_eq!(r.command_patterns, strings(&["git *", "cargo *"]));
    }

    #[test]
    fn resolve_rejects_tools_outside_allowed_set() {
        let allowed: BTreeSet<String> = strings(&["Read"]).into_iter().collect();
        let err =
            Restrictions::resolve(&allowed, &policy(), Some(&strings(&["Read", "Write"])))
                .unwrap_err();
        assert!(matches!(err, RosterError::PolicyViolation(_)));
        assert!(err.to_string().contains("Write"));
    }

    #[test]
    fn shell_tool_is_scoped_to_patterns() {
        let allowed: BTreeSet<String> = strings(&["Read", "Bash"]).into_iter().collect();
        let r = Restrictions::resolve(&allowed, &policy(), None).unwrap();
        assert_eq!(r.allowed_tools_arg(), "Bash(git *),Bash(cargo *),Read");
        assert_eq!(
            r.disallowed_tools_arg(),
            "Bash(git push --force*),Bash(rm -rf /)"
        );
    }

    #[test]
    fn shell_tool_without_patterns_is_dropped() {
        let allowed: BTreeSet<String> = strings(&["Read", "Bash"]).into_iter().collect();
        let none = CommandPolicy::new(vec![], vec![]).unwrap();
        let r = Restrictions::resolve(&allowed, &none, None).unwrap();
        assert_eq!(r.allowed_tools_arg(), "Read");
    }

    proptest! {
        #[test]
        fn resolved_tools_are_subset_of_allowed(
            allowed in proptest::collection::btree_set("[A-Z][a-z]{1,6}", 0..6),
            requested in proptest::collection::vec("[A-Z][a-z]{1,6}", 0..6),
        ) {
            match Restrictions::resolve(&allowed, &policy(), Some(&requested)) {
                Ok(r) => prop_assert!(r.tools.is_subset(&allowed)),
                Err(RosterError::PolicyViolation(_)) => {
                    prop_assert!(requested.iter().any(|t| !allowed.contains(t)))
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
