use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::http::send_retrying;
use crate::constants::http::{REQUEST_TIMEOUT, USER_AGENT};
use crate::constants::matching::SEARCH_PAGE_SIZE;
use crate::models::CatalogEntry;

const ANILIST_API: &str = "https://graphql.anilist.co";
const ANILIST_AUTHORIZE: &str = "https://anilist.co/api/v2/oauth/authorize";

#[derive(Serialize)]
struct GraphQLRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<Data>,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Deserialize)]
struct Page {
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct Media {
    id: i32,
    title: Title,
    #[serde(default)]
    synonyms: Vec<String>,
    episodes: Option<u32>,
    #[serde(rename = "siteUrl")]
    site_url: Option<String>,
    relations: Option<Relations>,
}

#[derive(Deserialize)]
struct Title {
    romaji: Option<String>,
    english: Option<String>,
}

#[derive(Deserialize)]
struct Relations {
    edges: Vec<RelationEdge>,
    nodes: Vec<RelationNode>,
}

#[derive(Deserialize)]
struct RelationEdge {
    #[serde(rename = "relationType")]
    relation_type: RelationType,
}

#[derive(Deserialize)]
struct RelationNode {
    id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Prequel,
    Sequel,
    #[serde(other)]
    Other,
}

/// A catalog entry together with the ids it is related to, as returned
/// by the relation-aware lookup.
#[derive(Debug, Clone)]
pub struct RelatedEntry {
    pub entry: CatalogEntry,
    pub related: Vec<(RelationType, i32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Current,
    Completed,
}

impl ListStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Completed => "COMPLETED",
        }
    }
}

/// Outcome of a list mutation, separated so callers can distinguish a
/// revoked token from any other failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Applied,
    InvalidToken,
    Failed,
}

#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
}

impl Default for AnilistClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AnilistClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Search the catalog by title. Error statuses degrade to an empty
    /// result so a flaky API never aborts a session.
    pub async fn search(&self, query: &str) -> Result<Vec<CatalogEntry>> {
        let gql_query = r#"
            query ($search: String, $perPage: Int) {
                Page(page: 1, perPage: $perPage) {
                    media(search: $search, type: ANIME) {
                        id
                        title { romaji english }
                        synonyms
                        episodes
                        siteUrl
                    }
                }
            }
        "#;

        #[derive(Serialize)]
        struct SearchVars<'a> {
            search: &'a str,
            #[serde(rename = "perPage")]
            per_page: u32,
        }

        let request_body = GraphQLRequest {
            query: gql_query,
            variables: SearchVars {
                search: query,
                per_page: SEARCH_PAGE_SIZE,
            },
        };

        let response = send_retrying(self.client.post(ANILIST_API).json(&request_body)).await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "AniList search returned an error status");
            return Ok(Vec::new());
        }

        let parsed: GraphQLResponse = response.json().await?;
        Ok(parsed
            .data
            .map(|d| d.page.media.into_iter().map(map_media_to_entry).collect())
            .unwrap_or_default())
    }

    /// Fetch one entry by id, including its prequel/sequel edges.
    pub async fn entry_with_relations(&self, id: i32) -> Result<Option<RelatedEntry>> {
        let gql_query = r#"
            query ($id: Int) {
                Media(id: $id, type: ANIME) {
                    id
                    title { romaji english }
                    synonyms
                    episodes
                    siteUrl
                    relations {
                        edges { relationType }
                        nodes { id }
                    }
                }
            }
        "#;

        #[derive(Serialize)]
        struct IdVars {
            id: i32,
        }

        #[derive(Deserialize)]
        struct IdResponse {
            data: Option<MediaWrapper>,
        }

        #[derive(Deserialize)]
        struct MediaWrapper {
            #[serde(rename = "Media")]
            media: Option<Media>,
        }

        let request_body = GraphQLRequest {
            query: gql_query,
            variables: IdVars { id },
        };

        let response = send_retrying(self.client.post(ANILIST_API).json(&request_body)).await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), id, "AniList entry lookup returned an error status");
            return Ok(None);
        }

        let parsed: IdResponse = response.json().await?;
        Ok(parsed.data.and_then(|d| d.media).map(|media| {
            let related = media.related_ids();
            RelatedEntry {
                entry: map_media_to_entry(media),
                related,
            }
        }))
    }

    /// Record watch progress on the authorized user's list.
    pub async fn save_list_entry(
        &self,
        token: &str,
        media_id: i32,
        status: ListStatus,
        progress: u32,
    ) -> Result<UpdateStatus> {
        let gql_query = r#"
            mutation ($mediaId: Int, $status: MediaListStatus, $progress: Int) {
                SaveMediaListEntry(mediaId: $mediaId, status: $status, progress: $progress) {
                    id
                }
            }
        "#;

        #[derive(Serialize)]
        struct MutationVars<'a> {
            #[serde(rename = "mediaId")]
            media_id: i32,
            status: &'a str,
            progress: u32,
        }

        let request_body = GraphQLRequest {
            query: gql_query,
            variables: MutationVars {
                media_id,
                status: status.as_str(),
                progress,
            },
        };

        let response = send_retrying(
            self.client
                .post(ANILIST_API)
                .bearer_auth(token)
                .json(&request_body),
        )
        .await?;

        let status_code = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(classify_update(status_code, &body))
    }

    /// OAuth page where the user grants miru access to their list.
    #[must_use]
    pub fn authorize_url(client_id: &str) -> String {
        format!("{ANILIST_AUTHORIZE}?client_id={client_id}&response_type=token")
    }
}

impl Media {
    fn related_ids(&self) -> Vec<(RelationType, i32)> {
        self.relations.as_ref().map_or_else(Vec::new, |relations| {
            relations
                .edges
                .iter()
                .zip(relations.nodes.iter())
                .map(|(edge, node)| (edge.relation_type, node.id))
                .collect()
        })
    }
}

fn map_media_to_entry(media: Media) -> CatalogEntry {
    let mut official_titles = Vec::new();
    for title in [media.title.romaji, media.title.english].into_iter().flatten() {
        if !official_titles.contains(&title) {
            official_titles.push(title);
        }
    }

    let mut synonyms = media.synonyms;
    synonyms.sort();

    CatalogEntry {
        id: media.id,
        official_titles,
        synonyms,
        episode_count: media.episodes,
        entry_url: media
            .site_url
            .unwrap_or_else(|| format!("https://anilist.co/anime/{}", media.id)),
        prequel_id: None,
        sequel_id: None,
    }
}

/// Map the mutation response onto an outcome. A 400 whose error list
/// contains "Invalid token" means the stored token was revoked; every
/// other non-success status is a plain failure.
fn classify_update(status: StatusCode, body: &str) -> UpdateStatus {
    if status.is_success() {
        return UpdateStatus::Applied;
    }

    if status == StatusCode::BAD_REQUEST {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            errors: Vec<ApiError>,
        }

        #[derive(Deserialize)]
        struct ApiError {
            message: Option<String>,
        }

        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            if parsed
                .errors
                .iter()
                .any(|e| e.message.as_deref() == Some("Invalid token"))
            {
                return UpdateStatus::InvalidToken;
            }
        }
    }

    UpdateStatus::Failed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_update_is_applied() {
        let body = r#"{"data":{"SaveMediaListEntry":{"id":1}}}"#;
        assert_eq!(classify_update(StatusCode::OK, body), UpdateStatus::Applied);
    }

    #[test]
    fn invalid_token_is_detected() {
        let body = r#"{"errors":[{"message":"Invalid token","status":400}],"data":null}"#;
        assert_eq!(
            classify_update(StatusCode::BAD_REQUEST, body),
            UpdateStatus::InvalidToken
        );
    }

    #[test]
    fn other_bad_requests_are_plain_failures() {
        let body = r#"{"errors":[{"message":"Validation failed","status":400}]}"#;
        assert_eq!(classify_update(StatusCode::BAD_REQUEST, body), UpdateStatus::Failed);
        assert_eq!(classify_update(StatusCode::BAD_REQUEST, "not json"), UpdateStatus::Failed);
    }

    #[test]
    fn server_errors_are_plain_failures() {
        assert_eq!(
            classify_update(StatusCode::INTERNAL_SERVER_ERROR, ""),
            UpdateStatus::Failed
        );
    }

    #[test]
    fn authorize_url_carries_client_id() {
        let url = AnilistClient::authorize_url("4242");
        assert_eq!(
            url,
            "https://anilist.co/api/v2/oauth/authorize?client_id=4242&response_type=token"
        );
    }
}
