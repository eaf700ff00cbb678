pub mod title;

pub use title::{clean_string, TitleMatcher};
