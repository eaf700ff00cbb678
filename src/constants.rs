pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "webm", "mov", "wmv", "flv", "m4v"];

pub mod http {
    use std::time::Duration;

    pub const USER_AGENT: &str = "miru/0.1";

    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Extra attempts after a 429 before giving up.
    pub const MAX_RETRIES: u32 = 2;
}

pub mod matching {
    pub const MIN_TITLE_SIMILARITY: f64 = 0.90;

    pub const SEARCH_PAGE_SIZE: u32 = 10;
}

pub mod crosswalk {
    pub const DATASET_REPO: &str = "Fribb/anime-lists";

    pub const DATASET_FILE: &str = "anime-list-full.json";
}
