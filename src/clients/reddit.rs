use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::clients::http::send_retrying;
use crate::constants::http::REQUEST_TIMEOUT;
use crate::credentials::{keys, CredentialStore};

const REDDIT_WWW: &str = "https://www.reddit.com";
const REDDIT_OAUTH: &str = "https://oauth.reddit.com";

/// Script-app credentials for the password OAuth grant. Only needed for
/// voting; searching works anonymously.
#[derive(Debug, Clone)]
pub struct RedditAppCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl RedditAppCredentials {
    /// All four keys must be present; anything less disables voting.
    #[must_use]
    pub fn from_store(store: &dyn CredentialStore) -> Option<Self> {
        Some(Self {
            client_id: store.get(keys::REDDIT_APP_CLIENT_ID)?,
            client_secret: store.get(keys::REDDIT_APP_CLIENT_SECRET)?,
            username: store.get(keys::REDDIT_USERNAME)?,
            password: store.get(keys::REDDIT_PASSWORD)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionThread {
    pub title: String,
    pub url: String,
    /// Reddit thing id (`t3_...`), needed for voting.
    pub fullname: String,
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: Submission,
}

#[derive(Deserialize)]
struct Submission {
    title: String,
    name: String,
    url: String,
}

#[derive(Clone)]
pub struct RedditClient {
    client: Client,
    credentials: Option<RedditAppCredentials>,
}

impl RedditClient {
    #[must_use]
    pub fn new(user_agent: &str, credentials: Option<RedditAppCredentials>) -> Self {
        Self {
            client: Client::builder()
                .user_agent(user_agent)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            credentials,
        }
    }

    /// Run a search against r/anime, newest first. Error statuses
    /// degrade to no results.
    ///
    /// At most two submissions come back: that is enough to tell
    /// "exactly one hit" apart from "several", which is all the caller
    /// ever needs.
    pub async fn search_episode_threads(&self, query: &str) -> Result<Vec<DiscussionThread>> {
        let request = self
            .client
            .get(format!("{REDDIT_WWW}/r/anime/search.json"))
            .query(&[
                ("q", query),
                ("sort", "new"),
                ("t", "all"),
                ("restrict_sr", "on"),
                ("limit", "2"),
            ]);

        let response = send_retrying(request).await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Reddit search returned an error status");
            return Ok(Vec::new());
        }

        let listing: Listing = response.json().await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| DiscussionThread {
                title: child.data.title,
                url: child.data.url,
                fullname: child.data.name,
            })
            .collect())
    }

    /// Browser URL for a manual r/anime search, used when no single
    /// discussion thread could be pinned down.
    #[must_use]
    pub fn search_page_url(title: &str) -> String {
        let query = format!("flair:episode {title}");
        let mut url = match Url::parse(&format!("{REDDIT_WWW}/r/anime/search")) {
            Ok(url) => url,
            Err(_) => return format!("{REDDIT_WWW}/r/anime/"),
        };
        url.query_pairs_mut()
            .append_pair("q", query.trim())
            .append_pair("sort", "new")
            .append_pair("t", "all")
            .append_pair("restrict_sr", "on");
        url.into()
    }

    /// Upvote a submission. A no-op without credentials.
    pub async fn upvote(&self, fullname: &str) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            debug!("No Reddit credentials stored, skipping upvote");
            return Ok(());
        };

        let token = self.access_token(credentials).await?;
        self.client
            .post(format!("{REDDIT_OAUTH}/api/vote"))
            .bearer_auth(token)
            .form(&[("id", fullname), ("dir", "1")])
            .send()
            .await?
            .error_for_status()
            .context("Reddit vote request failed")?;
        Ok(())
    }

    async fn access_token(&self, credentials: &RedditAppCredentials) -> Result<String> {
        #[derive(Deserialize)]
        struct AccessToken {
            access_token: String,
        }

        let response = self
            .client
            .post(format!("{REDDIT_WWW}/api/v1/access_token"))
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .context("Reddit token request failed")?;

        let token: AccessToken = response.json().await?;
        Ok(token.access_token)
    }
}
