//! Backend implementations for the render module
//!
//! Only the headless recorder lives here; the native Direct3D backend is
//! provided by the injector and implements the same trait.

/// Headless recording backend
pub mod headless;
