pub mod catalog;
pub mod episode;

pub use catalog::CatalogEntry;
pub use episode::EpisodeIdentity;
