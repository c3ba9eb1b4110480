pub mod axidma;
pub mod registry;

pub use registry::DevRegistry;
