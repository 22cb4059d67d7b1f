//! Computed sandbox attributes for an isolated context.

use serde::Serialize;

/// Output of [`super::PermissionMapper`]: the sandbox flags and the
/// permission-policy allow-list handed to the hosting container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SandboxDirectives {
    sandbox: Vec<&'static str>,
    allow: Vec<&'static str>,
}

impl SandboxDirectives {
    pub(crate) fn new(sandbox: Vec<&'static str>, allow: Vec<&'static str>) -> Self {
        Self { sandbox, allow }
    }

    pub fn sandbox(&self) -> &[&'static str] {
        &self.sandbox
    }

    pub fn allow(&self) -> &[&'static str] {
        &self.allow
    }

    /// Space-separated value for a `sandbox` attribute.
    pub fn sandbox_attribute(&self) -> String {
        self.sandbox.join(" ")
    }

    /// Semicolon-separated value for an `allow` attribute.
    pub fn allow_attribute(&self) -> String {
        self.allow.join("; ")
    }

    pub fn grants(&self, feature: &str) -> bool {
        self.allow.iter().any(|granted| *granted == feature)
    }
}
