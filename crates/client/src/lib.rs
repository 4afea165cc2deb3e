pub mod reference;

pub use reference::{ReferenceApi, ReferenceError, ReferenceRepository};
