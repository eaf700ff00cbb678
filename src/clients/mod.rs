pub mod anilist;
pub mod crosswalk;
mod http;
pub mod qbittorrent;
pub mod reddit;
pub mod tmdb;

pub use anilist::AnilistClient;
pub use crosswalk::{Crosswalk, CrosswalkClient};
pub use qbittorrent::QBittorrentClient;
pub use reddit::RedditClient;
pub use tmdb::TmdbClient;
