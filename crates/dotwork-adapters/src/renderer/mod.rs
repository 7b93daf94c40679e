//! Content rendering.
//!
//! [`TeraRenderer`] implements the core's `FileRenderer` port; the
//! [`placeholders`] module offers the discovery helpers used for template
//! introspection.

mod engine;
pub mod placeholders;

pub use engine::{TEXT_EXTENSIONS, TeraRenderer, is_text_file};
pub use placeholders::{
    find_all_placeholders, find_placeholders, find_placeholders_in_file, unique_placeholders,
};
