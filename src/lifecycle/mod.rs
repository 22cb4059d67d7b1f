//! Setup state machine: fetch, resolve, host, connect, ready, and teardown
//! on every tool, content, client or container change.

mod controller;
mod reader;
mod status;
mod view;

pub use controller::LifecycleController;
pub use reader::{ReadOutcome, ResourceReader};
pub use status::{Status, StatusTracker};
pub use view::EmbedView;
