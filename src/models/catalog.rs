/// A resolved catalog listing for one anime, carried on an
/// [`EpisodeIdentity`](crate::models::EpisodeIdentity) once resolution
/// succeeds.
///
/// `prequel_id` / `sequel_id` are only populated when the entry was built
/// as part of a relation chain; a direct title match leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i32,
    /// Official titles in the order the catalog reports them.
    pub official_titles: Vec<String>,
    /// Alternate titles, sorted.
    pub synonyms: Vec<String>,
    pub episode_count: Option<u32>,
    pub entry_url: String,
    pub prequel_id: Option<i32>,
    pub sequel_id: Option<i32>,
}

impl CatalogEntry {
    #[must_use]
    pub fn primary_title(&self) -> &str {
        self.official_titles.first().map_or("", String::as_str)
    }

    /// Official titles followed by synonyms, deduplicated, order preserved.
    #[must_use]
    pub fn all_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::with_capacity(self.official_titles.len() + self.synonyms.len());
        for title in self.official_titles.iter().chain(self.synonyms.iter()) {
            if !title.is_empty() && !titles.iter().any(|t| t == title) {
                titles.push(title.clone());
            }
        }
        titles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CatalogEntry {
        CatalogEntry {
            id: 101921,
            official_titles: vec![
                "Kaguya-sama wa Kokurasetai?".to_string(),
                "Kaguya-sama: Love is War?".to_string(),
            ],
            synonyms: vec!["Kaguya-sama S2".to_string(), "Kaguya-sama: Love is War?".to_string()],
            episode_count: Some(12),
            entry_url: "https://anilist.co/anime/101921".to_string(),
            prequel_id: None,
            sequel_id: None,
        }
    }

    #[test]
    fn primary_title_is_first_official() {
        assert_eq!(entry().primary_title(), "Kaguya-sama wa Kokurasetai?");
    }

    #[test]
    fn primary_title_empty_when_no_titles() {
        let mut e = entry();
        e.official_titles.clear();
        assert_eq!(e.primary_title(), "");
    }

    #[test]
    fn all_titles_appends_synonyms_without_duplicates() {
        let titles = entry().all_titles();
        assert_eq!(
            titles,
            vec![
                "Kaguya-sama wa Kokurasetai?".to_string(),
                "Kaguya-sama: Love is War?".to_string(),
                "Kaguya-sama S2".to_string(),
            ]
        );
    }
}
