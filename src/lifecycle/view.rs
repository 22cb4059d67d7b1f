use serde::Serialize;

use super::Status;

/// What the embedder should display.
///
/// The rendering surface stays mounted at all times and is only hidden
/// outside `Ready`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedView {
    pub status: Status,
    pub surface_visible: bool,
    pub banner: Option<String>,
}

impl EmbedView {
    pub fn new(status: Status, configuration_error: Option<&str>) -> Self {
        let banner = match &status {
            Status::Failed(reason) => Some(reason.clone()),
            Status::NoResource => configuration_error.map(str::to_string),
            _ => None,
        };
        Self {
            surface_visible: status.is_ready(),
            status,
            banner,
        }
    }
}
