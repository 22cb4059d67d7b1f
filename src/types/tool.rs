//! Tool descriptor as supplied by the caller's tool catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::UiResourceCsp;

/// Metadata record describing a callable tool, optionally declaring an
/// embeddable UI resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiResourceMeta>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_ui(mut self, ui: UiResourceMeta) -> Self {
        self.ui = Some(ui);
        self
    }

    /// The declared UI resource identifier. Blank identifiers count as absent.
    pub fn resource_uri(&self) -> Option<&str> {
        self.ui
            .as_ref()
            .and_then(|ui| ui.resource_uri.as_deref())
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    pub fn permissions(&self) -> Option<&UiPermissions> {
        self.ui.as_ref().and_then(|ui| ui.permissions.as_ref())
    }

    pub fn csp(&self) -> Option<&UiResourceCsp> {
        self.ui.as_ref().and_then(|ui| ui.csp.as_ref())
    }
}

/// The `ui` block of a tool descriptor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiResourceMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<UiPermissions>,
    #[serde(
        default,
        rename = "contentSecurityPolicy",
        alias = "csp",
        skip_serializing_if = "Option::is_none"
    )]
    pub csp: Option<UiResourceCsp>,
}

impl UiResourceMeta {
    pub fn new(resource_uri: impl Into<String>) -> Self {
        Self {
            resource_uri: Some(resource_uri.into()),
            ..Default::default()
        }
    }

    pub fn with_permissions(mut self, permissions: UiPermissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_csp(mut self, csp: UiResourceCsp) -> Self {
        self.csp = Some(csp);
        self
    }
}

/// Capability name to configuration value, as declared by the tool.
///
/// Backed by an ordered map so iteration never depends on declaration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiPermissions(BTreeMap<String, Value>);

impl UiPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a capability with an empty configuration object.
    pub fn grant(self, capability: impl Into<String>) -> Self {
        self.with(capability, Value::Object(Default::default()))
    }

    pub fn with(mut self, capability: impl Into<String>, config: Value) -> Self {
        self.0.insert(capability.into(), config);
        self
    }

    pub fn get(&self, capability: &str) -> Option<&Value> {
        self.0.get(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for UiPermissions {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_deserialize() {
        let tool: ToolDescriptor = serde_json::from_value(json!({
            "name": "weather",
            "description": "Shows a forecast",
            "ui": {
                "resourceUri": "ui://weather/forecast",
                "permissions": { "camera": {} },
                "contentSecurityPolicy": { "connectDomains": ["https://api.example.com"] }
            }
        }))
        .unwrap();

        assert_eq!(tool.name, "weather");
        assert_eq!(tool.resource_uri(), Some("ui://weather/forecast"));
        assert!(tool.permissions().unwrap().get("camera").is_some());
        assert_eq!(
            tool.csp().unwrap().connect_domains,
            vec!["https://api.example.com".to_string()]
        );
    }

    #[test]
    fn test_resource_uri_absent() {
        assert_eq!(ToolDescriptor::new("plain").resource_uri(), None);

        let blank = ToolDescriptor::new("blank").with_ui(UiResourceMeta::new("  "));
        assert_eq!(blank.resource_uri(), None);

        let no_uri = ToolDescriptor::new("meta-only").with_ui(UiResourceMeta::default());
        assert_eq!(no_uri.resource_uri(), None);
    }

    #[test]
    fn test_permissions_builder() {
        let permissions = UiPermissions::new()
            .grant("microphone")
            .with("camera", json!({ "facing": "user" }));

        assert_eq!(permissions.len(), 2);
        let keys: Vec<_> = permissions.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["camera", "microphone"]);
    }
}
