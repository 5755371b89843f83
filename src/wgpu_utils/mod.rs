//! Small wrappers over wgpu resources.

pub mod uniform_buffer;

pub use uniform_buffer::UniformBuffer;
