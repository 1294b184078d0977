pub mod entities;
pub mod slug;
pub mod validators;

// Re-export tracing for use in this crate
pub use tracing;
