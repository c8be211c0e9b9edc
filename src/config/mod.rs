pub mod loader;
pub mod model;

pub use loader::{load, resolve_config_path};
pub use model::{ApprovalConfig, Config, HeaderConfig, Rule, RuleMatch};
