//! Mesh file loading.

pub use obj::load_obj;

pub mod obj;
