//! Service layer: composition root and lifecycle.

mod container;

pub use container::ServiceContainer;
