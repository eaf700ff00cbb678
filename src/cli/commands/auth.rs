use dialoguer::Password;
use dialoguer::theme::ColorfulTheme;
use tracing::warn;

use crate::clients::AnilistClient;
use crate::config::Config;
use crate::credentials::{CredentialStore, EnvFileStore, keys};

pub fn cmd_auth(config: &Config) -> anyhow::Result<()> {
    let url = AnilistClient::authorize_url(&config.anilist.client_id);
    println!("Authorization page: {url}");
    if let Err(e) = open::that(&url) {
        warn!(error = %e, "Failed to open the authorization page");
    }

    let token = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Paste the token provided by AniList")
        .interact()?;

    let store = EnvFileStore::new(Config::credentials_path());
    store.set(keys::ANILIST_TOKEN, token.trim())?;
    println!("✓ AniList token stored.");
    Ok(())
}
