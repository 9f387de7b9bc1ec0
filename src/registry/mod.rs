mod core;
mod scope;

pub use self::core::{ComponentRegistry, Instance, InstanceId, InstanceStats};
pub(crate) use self::core::EffectRecord;
pub use scope::{current_instance, has_current_instance};
pub(crate) use scope::RenderScope;
