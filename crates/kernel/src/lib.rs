//! Core traits, settings, and the module registry shared by every Stacks crate.

pub mod admin;
pub mod clock;
pub mod module;
pub mod registry;
pub mod settings;

pub use admin::{AdminSite, Fieldset, Inline, InlineStyle, ModelAdmin};
pub use clock::{Clock, FixedClock, SystemClock};
pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
