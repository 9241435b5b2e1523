//! Window records and the bookkeeping around them.

pub mod focus;
pub mod registry;
pub mod window;

pub use focus::{CAPSULE_Z_BASE, FocusManager};
pub use registry::WindowRegistry;
pub use window::{
    AppBinding, CapsuleSnapshot, ContentSlot, LifecycleState, PreviewImage, TabId, WindowConfig,
    WindowConfigOverrides, WindowId, WindowRecord,
};
