pub mod filename;

pub use filename::parse_filename;
