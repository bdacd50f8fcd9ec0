//! logrotor Glob - expands group patterns into the files each group owns

mod resolver;

pub use resolver::{resolve, ResolvedGroup};
