//! Interactive watch session.
//!
//! One episode-selection cycle runs as a small state machine over
//! terminal prompts. Picking an episode immediately spawns a metadata
//! prefetch task (catalog resolution + discussion search) so the network
//! round trips overlap with the video playing; the task is joined the
//! first time a prompt needs its result. The progress mutation runs in
//! its own task and is collected at the end of the cycle, where a
//! rejected token loops the flow back through authorization.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result;
use dialoguer::console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Password, Select};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clients::qbittorrent::QBitConnection;
use crate::clients::reddit::{DiscussionThread, RedditAppCredentials};
use crate::clients::{
    AnilistClient, Crosswalk, CrosswalkClient, QBittorrentClient, RedditClient, TmdbClient,
};
use crate::config::Config;
use crate::credentials::{CredentialStore, EnvFileStore, keys};
use crate::discussion::{self, DiscussionFinder};
use crate::matching::TitleMatcher;
use crate::models::EpisodeIdentity;
use crate::progress::ProgressUpdater;
use crate::resolver::CatalogResolver;

const RELOAD_CHOICE: &str = "[Reload episodes]";

#[derive(Debug, Clone, Copy)]
enum State {
    SelectEpisode,
    PlayVideo,
    AuthCatalog,
    UpdateProgress,
    OpenDiscussion,
    OpenCatalogPage,
    DeleteEpisode,
    CleanUp,
}

enum Flow {
    Continue(State),
    Quit,
}

struct Prefetched {
    identity: EpisodeIdentity,
    discussion: Option<DiscussionThread>,
}

pub struct Session {
    config: Config,
    qbittorrent: QBittorrentClient,
    resolver: Arc<CatalogResolver>,
    finder: Arc<DiscussionFinder<RedditClient>>,
    updater: Arc<ProgressUpdater>,
    reddit: RedditClient,
    episodes: Vec<EpisodeIdentity>,
    current: Option<EpisodeIdentity>,
    discussion: Option<DiscussionThread>,
    prefetch: Option<JoinHandle<Prefetched>>,
    update_task: Option<JoinHandle<bool>>,
    advance_to_clean_up: bool,
}

impl Session {
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn CredentialStore> =
            Arc::new(EnvFileStore::new(Config::credentials_path()));

        let qbittorrent = QBittorrentClient::new(QBitConnection {
            base_url: config.qbittorrent.url.clone(),
            username: config.qbittorrent.username.clone(),
            password: store.get(keys::QBITTORRENT_PASSWORD).unwrap_or_default(),
            category: config.qbittorrent.category.clone(),
        });

        let anilist = AnilistClient::new();

        let tmdb = store.get(keys::TMDB_API_KEY).map(TmdbClient::new);
        if tmdb.is_none() {
            debug!("No TMDB API key stored, season fallback resolution disabled");
        }

        let crosswalk_client =
            CrosswalkClient::new(&config.data_dir(), store.get(keys::GITHUB_TOKEN));
        let crosswalk = match crosswalk_client.load().await {
            Ok(crosswalk) => crosswalk,
            Err(e) => {
                warn!(error = %e, "Crosswalk dataset unavailable, season fallback degraded");
                Crosswalk::empty()
            }
        };

        let resolver = Arc::new(CatalogResolver::new(
            anilist.clone(),
            tmdb,
            crosswalk,
            TitleMatcher::new(config.matching.min_title_similarity),
        ));

        let reddit = RedditClient::new(
            &config.reddit.user_agent,
            RedditAppCredentials::from_store(store.as_ref()),
        );
        let finder = Arc::new(DiscussionFinder::new(reddit.clone()));
        let updater = Arc::new(ProgressUpdater::new(anilist, Arc::clone(&store)));

        Ok(Self {
            config,
            qbittorrent,
            resolver,
            finder,
            updater,
            reddit,
            episodes: Vec::new(),
            current: None,
            discussion: None,
            prefetch: None,
            update_task: None,
            advance_to_clean_up: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.reload_episodes().await;

        let mut state = State::SelectEpisode;
        loop {
            let flow = match state {
                State::SelectEpisode => self.select_episode().await?,
                State::PlayVideo => self.play_video()?,
                State::AuthCatalog => self.auth_catalog()?,
                State::UpdateProgress => self.update_progress().await?,
                State::OpenDiscussion => self.open_discussion().await?,
                State::OpenCatalogPage => self.open_catalog_page()?,
                State::DeleteEpisode => self.delete_episode().await?,
                State::CleanUp => self.clean_up().await?,
            };
            match flow {
                Flow::Continue(next) => state = next,
                Flow::Quit => break,
            }
        }

        self.abort_tasks();
        Ok(())
    }

    async fn reload_episodes(&mut self) {
        match self.qbittorrent.discover_episodes().await {
            Ok(mut episodes) => {
                episodes.sort_by(episode_order);
                info!(count = episodes.len(), "Episodes ready to watch");
                self.episodes = episodes;
            }
            Err(e) => {
                warn!(error = %e, "Failed to list episodes from qBittorrent");
                self.episodes = Vec::new();
            }
        }
    }

    async fn select_episode(&mut self) -> Result<Flow> {
        Term::stdout().clear_screen().ok();
        self.reset_cycle();

        let mut items = vec![RELOAD_CHOICE.to_string()];
        items.extend(self.episodes.iter().map(EpisodeIdentity::display_name));

        let Some(choice) = Select::with_theme(&theme())
            .with_prompt("Pick an episode")
            .items(&items)
            .default(0)
            .interact_opt()?
        else {
            return Ok(Flow::Quit);
        };

        if choice == 0 {
            self.reload_episodes().await;
            return Ok(Flow::Continue(State::SelectEpisode));
        }

        let identity = self.episodes[choice - 1].clone();
        self.prefetch = Some(self.spawn_prefetch(identity.clone()));
        self.current = Some(identity);
        Ok(Flow::Continue(State::PlayVideo))
    }

    fn play_video(&mut self) -> Result<Flow> {
        let Some(identity) = self.current.as_ref() else {
            return Ok(Flow::Continue(State::SelectEpisode));
        };

        let Some(play) = confirm("Play video?", true)? else {
            return Ok(Flow::Quit);
        };
        if play && let Err(e) = open::that(&identity.path) {
            warn!(error = %e, path = %identity.path.display(), "Failed to launch the video player");
        }
        Ok(Flow::Continue(State::AuthCatalog))
    }

    fn auth_catalog(&mut self) -> Result<Flow> {
        if !self.updater.needs_authorization() {
            return Ok(Flow::Continue(State::UpdateProgress));
        }

        let Some(proceed) = confirm(
            "AniList requires your authorization in order to update your anime list. Proceed?",
            true,
        )?
        else {
            return Ok(Flow::Quit);
        };
        if !proceed {
            return Ok(Flow::Continue(self.after_update_state()));
        }

        let url = AnilistClient::authorize_url(&self.config.anilist.client_id);
        if let Err(e) = open::that(&url) {
            warn!(error = %e, "Failed to open the authorization page");
            println!("Visit {url} to authorize miru.");
        }

        let token = Password::with_theme(&theme())
            .with_prompt("Paste the token provided by AniList")
            .interact()?;
        self.updater.store_token(&token)?;
        Ok(Flow::Continue(State::UpdateProgress))
    }

    async fn update_progress(&mut self) -> Result<Flow> {
        self.join_prefetch().await;

        let next = self.after_update_state();
        let Some(identity) = self.current.clone() else {
            return Ok(Flow::Continue(next));
        };
        let Some(entry) = identity.entry.as_ref() else {
            debug!("Episode did not resolve to a catalog entry, skipping progress update");
            return Ok(Flow::Continue(next));
        };
        if identity.progress().is_none() {
            return Ok(Flow::Continue(next));
        }

        let prompt = format!(
            "Update progress on AniList for \"{}\"?",
            entry.primary_title()
        );
        let Some(update) = confirm(&prompt, true)? else {
            return Ok(Flow::Quit);
        };
        if update {
            let updater = Arc::clone(&self.updater);
            self.update_task = Some(tokio::spawn(async move { updater.update(&identity).await }));
        }
        Ok(Flow::Continue(next))
    }

    async fn open_discussion(&mut self) -> Result<Flow> {
        let Some(open_thread) = confirm("Open r/anime discussion thread?", true)? else {
            return Ok(Flow::Quit);
        };
        if !open_thread {
            return Ok(Flow::Continue(State::OpenCatalogPage));
        }

        self.join_prefetch().await;
        if let Some(thread) = self.discussion.clone() {
            info!(title = %thread.title, "Opening discussion thread");
            match open::that(&thread.url) {
                Ok(()) => self.spawn_upvote(thread),
                Err(e) => warn!(error = %e, "Failed to open the browser"),
            }
        } else if let Some(identity) = self.current.as_ref() {
            debug!("No confident discussion thread, opening the search page");
            let url = discussion::fallback_url(identity);
            if let Err(e) = open::that(&url) {
                warn!(error = %e, "Failed to open the browser");
            }
        }
        Ok(Flow::Continue(State::OpenCatalogPage))
    }

    fn open_catalog_page(&mut self) -> Result<Flow> {
        let entry_url = self
            .current
            .as_ref()
            .filter(|identity| identity.is_last_episode())
            .and_then(|identity| identity.entry.as_ref())
            .map(|entry| entry.entry_url.clone());
        let Some(url) = entry_url else {
            return Ok(Flow::Continue(State::DeleteEpisode));
        };

        let Some(open_page) = confirm("Open AniList page for the anime?", true)? else {
            return Ok(Flow::Quit);
        };
        if open_page && let Err(e) = open::that(&url) {
            warn!(error = %e, "Failed to open the browser");
        }
        Ok(Flow::Continue(State::DeleteEpisode))
    }

    async fn delete_episode(&mut self) -> Result<Flow> {
        let Some(identity) = self.current.clone() else {
            return Ok(Flow::Continue(State::CleanUp));
        };

        let Some(delete) = confirm("Delete episode?", false)? else {
            return Ok(Flow::Quit);
        };
        if delete {
            match self.qbittorrent.delete_episode(&identity).await {
                Ok(()) => self.episodes.retain(|e| {
                    e.torrent_hash != identity.torrent_hash || e.file_index != identity.file_index
                }),
                Err(e) => warn!(error = %e, "Failed to delete the episode"),
            }
        }
        Ok(Flow::Continue(State::CleanUp))
    }

    async fn clean_up(&mut self) -> Result<Flow> {
        self.advance_to_clean_up = false;
        if let Some(handle) = self.update_task.take() {
            match handle.await {
                Ok(true) => {
                    self.advance_to_clean_up = true;
                    return Ok(Flow::Continue(State::AuthCatalog));
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Progress update task failed"),
            }
        }
        Ok(Flow::Continue(State::SelectEpisode))
    }

    /// Where the flow resumes after the update step. A token rejection
    /// re-enters authorization mid-cycle; the rest of the cycle already
    /// ran, so the retry path heads straight back to cleanup.
    fn after_update_state(&self) -> State {
        if self.advance_to_clean_up {
            State::CleanUp
        } else {
            State::OpenDiscussion
        }
    }

    fn spawn_prefetch(&self, identity: EpisodeIdentity) -> JoinHandle<Prefetched> {
        let resolver = Arc::clone(&self.resolver);
        let finder = Arc::clone(&self.finder);
        tokio::spawn(async move {
            let mut identity = identity;
            let entry = resolver.resolve(&mut identity).await;
            identity.entry = entry;
            let discussion = finder.find(&identity).await;
            Prefetched {
                identity,
                discussion,
            }
        })
    }

    async fn join_prefetch(&mut self) {
        let Some(handle) = self.prefetch.take() else {
            return;
        };
        match handle.await {
            Ok(prefetched) => {
                self.current = Some(prefetched.identity);
                self.discussion = prefetched.discussion;
            }
            Err(e) => warn!(error = %e, "Metadata prefetch task failed"),
        }
    }

    fn spawn_upvote(&self, thread: DiscussionThread) {
        let reddit = self.reddit.clone();
        tokio::spawn(async move {
            if let Err(e) = reddit.upvote(&thread.fullname).await {
                debug!(error = %e, "Could not upvote the discussion thread");
            }
        });
    }

    fn reset_cycle(&mut self) {
        self.abort_tasks();
        self.current = None;
        self.discussion = None;
        self.advance_to_clean_up = false;
    }

    fn abort_tasks(&mut self) {
        if let Some(handle) = self.prefetch.take() {
            handle.abort();
        }
        if let Some(handle) = self.update_task.take() {
            handle.abort();
        }
    }
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

fn confirm(prompt: &str, default_yes: bool) -> Result<Option<bool>> {
    let answer = Confirm::with_theme(&theme())
        .with_prompt(prompt)
        .default(default_yes)
        .interact_opt()?;
    Ok(answer)
}

fn episode_order(a: &EpisodeIdentity, b: &EpisodeIdentity) -> Ordering {
    a.anime_title
        .cmp(&b.anime_title)
        .then(a.season.cmp(&b.season))
        .then_with(|| {
            let left = a.episode_value().unwrap_or(f64::MAX);
            let right = b.episode_value().unwrap_or(f64::MAX);
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        })
}
