mod registry;
mod selectors;

pub use registry::{Capability, ModelFamily, ModelRegistry, ModelSpec};
pub use selectors::{ModelSelection, ModelSelector};
