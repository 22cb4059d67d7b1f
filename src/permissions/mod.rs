//! Translation of declared UI capabilities into sandbox constraints.

mod directives;

pub use directives::SandboxDirectives;

use crate::types::UiPermissions;
use serde_json::Value;

/// Sandbox flags every isolated context receives, and never more.
pub const SANDBOX_FLAGS: &[&str] = &["allow-scripts", "allow-same-origin"];

/// Recognized capability keys and the permission-policy feature each grants.
///
/// Table order is the output order of [`SandboxDirectives::allow`].
const CAPABILITY_FEATURES: &[(&[&str], &str)] = &[
    (&["camera"], "camera"),
    (&["microphone"], "microphone"),
    (&["geolocation"], "geolocation"),
    (&["clipboardWrite", "clipboard-write"], "clipboard-write"),
];

/// Maps a capability declaration onto sandbox directives.
pub struct PermissionMapper;

impl PermissionMapper {
    /// Compute directives for a declared permission set.
    ///
    /// Absent or empty input yields the minimal set. Unknown keys are ignored.
    /// A capability configured as `false` or `null` is not granted.
    pub fn map(permissions: Option<&UiPermissions>) -> SandboxDirectives {
        let allow = match permissions {
            Some(permissions) if !permissions.is_empty() => CAPABILITY_FEATURES
                .iter()
                .filter(|(keys, _)| keys.iter().any(|key| is_granted(permissions.get(key))))
                .map(|(_, feature)| *feature)
                .collect(),
            _ => Vec::new(),
        };

        SandboxDirectives::new(SANDBOX_FLAGS.to_vec(), allow)
    }

    pub fn is_recognized(capability: &str) -> bool {
        CAPABILITY_FEATURES
            .iter()
            .any(|(keys, _)| keys.iter().any(|key| *key == capability))
    }
}

fn is_granted(config: Option<&Value>) -> bool {
    !matches!(config, None | Some(Value::Null) | Some(Value::Bool(false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_permissions_minimal() {
        let directives = PermissionMapper::map(None);
        assert_eq!(directives.sandbox_attribute(), "allow-scripts allow-same-origin");
        assert_eq!(directives.allow_attribute(), "");
        assert!(directives.allow().is_empty());
    }

    #[test]
    fn test_empty_permissions_minimal() {
        let empty = UiPermissions::new();
        assert_eq!(PermissionMapper::map(Some(&empty)), PermissionMapper::map(None));
    }

    #[test]
    fn test_each_capability_adds_one_directive() {
        let permissions = UiPermissions::new().grant("camera").grant("clipboardWrite");
        let directives = PermissionMapper::map(Some(&permissions));
        assert_eq!(directives.allow(), ["camera", "clipboard-write"]);
        assert_eq!(directives.allow_attribute(), "camera; clipboard-write");
        assert_eq!(directives.sandbox(), SANDBOX_FLAGS);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let permissions = UiPermissions::new().grant("teleport").grant("geolocation");
        let directives = PermissionMapper::map(Some(&permissions));
        assert_eq!(directives.allow(), ["geolocation"]);
    }

    #[test]
    fn test_declaration_order_irrelevant() {
        let forward: UiPermissions = [("microphone", json!({})), ("camera", json!({}))]
            .into_iter()
            .collect();
        let reverse: UiPermissions = [("camera", json!({})), ("microphone", json!({}))]
            .into_iter()
            .collect();

        assert_eq!(
            PermissionMapper::map(Some(&forward)),
            PermissionMapper::map(Some(&reverse))
        );
    }

    #[test]
    fn test_deterministic_across_calls() {
        let permissions = UiPermissions::new().grant("camera").grant("microphone");
        let first = PermissionMapper::map(Some(&permissions));
        let _ = PermissionMapper::map(None);
        let _ = PermissionMapper::map(Some(&UiPermissions::new().grant("geolocation")));
        assert_eq!(PermissionMapper::map(Some(&permissions)), first);
    }

    #[test]
    fn test_disabled_capability_not_granted() {
        let permissions = UiPermissions::new()
            .with("camera", json!(false))
            .with("microphone", Value::Null);
        assert!(PermissionMapper::map(Some(&permissions)).allow().is_empty());
    }

    #[test]
    fn test_alias_counts_once() {
        let permissions = UiPermissions::new()
            .grant("clipboardWrite")
            .grant("clipboard-write");
        assert_eq!(
            PermissionMapper::map(Some(&permissions)).allow(),
            ["clipboard-write"]
        );
        assert!(PermissionMapper::is_recognized("clipboard-write"));
        assert!(!PermissionMapper::is_recognized("teleport"));
    }
}
