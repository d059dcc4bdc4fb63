pub mod cache;

pub use cache::{get_text, intern_text, lookup_text, text_count, Atom};
