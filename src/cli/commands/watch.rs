use crate::config::Config;
use crate::session::Session;

pub async fn cmd_watch(config: &Config) -> anyhow::Result<()> {
    let mut session = Session::new(config.clone()).await?;
    session.run().await
}
