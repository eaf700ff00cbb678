//! Relation chain walking.
//!
//! The catalog models each season of a show as a separate entry, linked
//! to its neighbours by prequel/sequel edges. Given the set of entry ids
//! that map to one TMDB series, this module stitches those entries into
//! a chain and converts absolute episode numbers (counted from the very
//! first episode of the show) into per-entry ones.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::clients::anilist::{AnilistClient, RelatedEntry, RelationType};
use crate::models::CatalogEntry;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("relation set has no entry without a prequel")]
    NoHead,

    #[error("relation set has multiple entries without a prequel: {0:?}")]
    AmbiguousHeads(Vec<i32>),
}

/// Where chain nodes come from. The indirection keeps chain logic
/// testable without a network.
#[async_trait]
pub trait RelationSource: Send + Sync {
    async fn fetch_related(&self, id: i32) -> Result<Option<RelatedEntry>>;
}

#[async_trait]
impl RelationSource for AnilistClient {
    async fn fetch_related(&self, id: i32) -> Result<Option<RelatedEntry>> {
        self.entry_with_relations(id).await
    }
}

/// An ordered chain of seasons, entered through the unique entry that
/// has no prequel.
#[derive(Debug)]
pub struct RelationChain {
    nodes: HashMap<i32, CatalogEntry>,
    head: i32,
}

impl RelationChain {
    /// Fetch every candidate entry and wire up prequel/sequel links.
    /// Edges pointing outside the candidate set are ignored, so spin-offs
    /// and movies never join the chain. Candidates the source does not
    /// know are silently dropped.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, and with [`ChainError`] when the
    /// surviving nodes do not form a chain with exactly one head.
    pub async fn build(source: &dyn RelationSource, candidate_ids: &[i32]) -> Result<Self> {
        let scope: HashSet<i32> = candidate_ids.iter().copied().collect();
        let mut queue: VecDeque<i32> = candidate_ids.iter().copied().collect();
        let mut visited: HashSet<i32> = HashSet::new();
        let mut nodes: HashMap<i32, CatalogEntry> = HashMap::new();
        let mut edges: Vec<(i32, RelationType, i32)> = Vec::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(related) = source.fetch_related(id).await? else {
                continue;
            };
            for (relation, target) in &related.related {
                if scope.contains(target) {
                    edges.push((id, *relation, *target));
                    if !visited.contains(target) {
                        queue.push_back(*target);
                    }
                }
            }
            nodes.insert(id, related.entry);
        }

        for (from, relation, to) in edges {
            match relation {
                RelationType::Sequel => link(&mut nodes, from, to),
                RelationType::Prequel => link(&mut nodes, to, from),
                RelationType::Other => {}
            }
        }

        let mut heads: Vec<i32> = nodes
            .values()
            .filter(|node| node.prequel_id.is_none())
            .map(|node| node.id)
            .collect();
        heads.sort_unstable();

        match heads.as_slice() {
            [] => Err(ChainError::NoHead.into()),
            [head] => Ok(Self { nodes, head: *head }),
            _ => Err(ChainError::AmbiguousHeads(heads).into()),
        }
    }

    /// Walk the chain from the head, accumulating episode counts, until
    /// the entry whose range contains `absolute` is found. Returns the
    /// entry id and the number relative to it.
    ///
    /// An entry without a known episode count ends the walk: episodes
    /// beyond it cannot be placed.
    #[must_use]
    pub fn resolve_absolute(&self, absolute: u32) -> Option<(i32, u32)> {
        let mut cumulative = 0;
        let mut visited = HashSet::new();
        let mut current = Some(self.head);

        while let Some(id) = current {
            // Malformed catalog data could loop the chain back on itself.
            if !visited.insert(id) {
                break;
            }
            let node = self.nodes.get(&id)?;
            let count = node.episode_count?;
            if absolute > cumulative && absolute <= cumulative + count {
                return Some((id, absolute - cumulative));
            }
            cumulative += count;
            current = node.sequel_id;
        }
        None
    }

    #[must_use]
    pub fn head_id(&self) -> i32 {
        self.head
    }

    #[must_use]
    pub fn get(&self, id: i32) -> Option<&CatalogEntry> {
        self.nodes.get(&id)
    }

    /// Move one entry out of the chain.
    #[must_use]
    pub fn take(mut self, id: i32) -> Option<CatalogEntry> {
        self.nodes.remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn link(nodes: &mut HashMap<i32, CatalogEntry>, prequel: i32, sequel: i32) {
    if !nodes.contains_key(&prequel) || !nodes.contains_key(&sequel) {
        return;
    }
    if let Some(node) = nodes.get_mut(&prequel) {
        node.sequel_id = Some(sequel);
    }
    if let Some(node) = nodes.get_mut(&sequel) {
        node.prequel_id = Some(prequel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSource {
        entries: HashMap<i32, RelatedEntry>,
    }

    impl StubSource {
        fn new(entries: Vec<RelatedEntry>) -> Self {
            Self {
                entries: entries.into_iter().map(|e| (e.entry.id, e)).collect(),
            }
        }
    }

    #[async_trait]
    impl RelationSource for StubSource {
        async fn fetch_related(&self, id: i32) -> Result<Option<RelatedEntry>> {
            Ok(self.entries.get(&id).cloned())
        }
    }

    fn entry(id: i32, episode_count: Option<u32>) -> CatalogEntry {
        CatalogEntry {
            id,
            official_titles: vec![format!("Entry {id}")],
            synonyms: Vec::new(),
            episode_count,
            entry_url: format!("https://anilist.co/anime/{id}"),
            prequel_id: None,
            sequel_id: None,
        }
    }

    fn related(id: i32, count: Option<u32>, related: Vec<(RelationType, i32)>) -> RelatedEntry {
        RelatedEntry {
            entry: entry(id, count),
            related,
        }
    }

    #[tokio::test]
    async fn two_season_chain_resolves_absolute_numbers() {
        let source = StubSource::new(vec![
            related(1, Some(12), vec![(RelationType::Sequel, 2)]),
            related(2, Some(13), vec![(RelationType::Prequel, 1)]),
        ]);

        let chain = RelationChain::build(&source, &[1, 2]).await.unwrap();
        assert_eq!(chain.head_id(), 1);
        assert_eq!(chain.len(), 2);

        assert_eq!(chain.resolve_absolute(5), Some((1, 5)));
        assert_eq!(chain.resolve_absolute(12), Some((1, 12)));
        assert_eq!(chain.resolve_absolute(13), Some((2, 1)));
        assert_eq!(chain.resolve_absolute(15), Some((2, 3)));
        assert_eq!(chain.resolve_absolute(25), Some((2, 13)));
        assert_eq!(chain.resolve_absolute(26), None);
        assert_eq!(chain.resolve_absolute(0), None);
    }

    #[tokio::test]
    async fn edges_outside_the_candidate_set_are_ignored() {
        let source = StubSource::new(vec![related(
            1,
            Some(12),
            vec![(RelationType::Sequel, 99), (RelationType::Other, 2)],
        )]);

        let chain = RelationChain::build(&source, &[1]).await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.head_id(), 1);
        let node = chain.get(1).unwrap();
        assert_eq!(node.sequel_id, None);
    }

    #[tokio::test]
    async fn disconnected_entries_are_ambiguous() {
        let source = StubSource::new(vec![
            related(1, Some(12), vec![]),
            related(2, Some(12), vec![]),
        ]);

        let err = RelationChain::build(&source, &[1, 2]).await.unwrap_err();
        match err.downcast_ref::<ChainError>() {
            Some(ChainError::AmbiguousHeads(ids)) => assert_eq!(ids, &vec![1, 2]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cyclic_relations_have_no_head() {
        let source = StubSource::new(vec![
            related(1, Some(12), vec![(RelationType::Sequel, 2)]),
            related(2, Some(12), vec![(RelationType::Sequel, 1)]),
        ]);

        let err = RelationChain::build(&source, &[1, 2]).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ChainError>(), Some(ChainError::NoHead)));
    }

    #[tokio::test]
    async fn unknown_episode_count_stops_the_walk() {
        let source = StubSource::new(vec![
            related(1, None, vec![(RelationType::Sequel, 2)]),
            related(2, Some(12), vec![(RelationType::Prequel, 1)]),
        ]);

        let chain = RelationChain::build(&source, &[1, 2]).await.unwrap();
        assert_eq!(chain.resolve_absolute(5), None);
    }

    #[tokio::test]
    async fn unknown_candidates_are_dropped() {
        let source = StubSource::new(vec![related(1, Some(12), vec![])]);

        let chain = RelationChain::build(&source, &[1, 777]).await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.resolve_absolute(3), Some((1, 3)));
    }
}
