//! Tool descriptors, UI resource metadata and fetched resource payloads.

mod resource;
mod tool;

pub use resource::{ResourceContent, UiResourceCsp};
pub use tool::{ToolDescriptor, UiPermissions, UiResourceMeta};
