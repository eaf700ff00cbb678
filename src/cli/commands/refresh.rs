use crate::clients::CrosswalkClient;
use crate::config::Config;
use crate::credentials::{CredentialStore, EnvFileStore, keys};

pub async fn cmd_refresh(config: &Config) -> anyhow::Result<()> {
    let store = EnvFileStore::new(Config::credentials_path());
    let client = CrosswalkClient::new(&config.data_dir(), store.get(keys::GITHUB_TOKEN));

    client.refresh().await?;
    let crosswalk = client.load().await?;

    println!("✓ Crosswalk dataset refreshed ({} mappings).", crosswalk.len());
    Ok(())
}
