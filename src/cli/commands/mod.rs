mod auth;
mod config;
mod refresh;
mod watch;

pub use auth::cmd_auth;
pub use config::{cmd_config_init, cmd_config_show};
pub use refresh::cmd_refresh;
pub use watch::cmd_watch;
