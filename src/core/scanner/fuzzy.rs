//! Fuzzy name index over a campaign's entities, used by every scanner
//! pass to resolve a candidate phrase to the closest known entity.

use strsim::jaro_winkler;

#[derive(Debug, Clone)]
pub struct EntityCandidate {
    pub id: String,
    pub name: String,
}

/// A snapshot of one campaign's entities, queried by approximate name.
/// Built once per scan; never mutated.
#[derive(Debug, Clone, Default)]
pub struct FuzzyNameIndex {
    entities: Vec<EntityCandidate>,
}

/// Result of a fuzzy lookup.
#[derive(Debug, Clone)]
pub struct FuzzyMatch {
    pub entity: EntityCandidate,
    pub similarity: f64,
}

impl FuzzyNameIndex {
    pub fn new(entities: Vec<EntityCandidate>) -> Self {
        Self { entities }
    }

    pub fn entities(&self) -> &[EntityCandidate] {
        &self.entities
    }

    /// Best-scoring entity for `query`, or `None` if the index is empty.
    /// Ties keep the first entity encountered, preserving campaign
    /// iteration order.
    pub fn best_match(&self, query: &str) -> Option<FuzzyMatch> {
        let query_lower = query.to_lowercase();
        let mut best: Option<FuzzyMatch> = None;
        for entity in &self.entities {
            let similarity = jaro_winkler(&query_lower, &entity.name.to_lowercase());
            let is_better = match &best {
                Some(current) => similarity > current.similarity,
                None => true,
            };
            if is_better {
                best = Some(FuzzyMatch {
                    entity: entity.clone(),
                    similarity,
                });
            }
        }
        best
    }

    /// Every entity scored against `query`, best first, capped at
    /// `limit`. Backs the `entities/resolve` search endpoint.
    pub fn top_matches(&self, query: &str, limit: usize) -> Vec<FuzzyMatch> {
        let query_lower = query.to_lowercase();
        let mut matches: Vec<FuzzyMatch> = self
            .entities
            .iter()
            .map(|entity| FuzzyMatch {
                entity: entity.clone(),
                similarity: jaro_winkler(&query_lower, &entity.name.to_lowercase()),
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_scores_near_one() {
        let index = FuzzyNameIndex::new(vec![EntityCandidate {
            id: "1".to_string(),
            name: "Viktor".to_string(),
        }]);
        let best = index.best_match("Viktor").unwrap();
        assert!(best.similarity >= 0.99);
    }

    #[test]
    fn empty_index_has_no_match() {
        let index = FuzzyNameIndex::new(vec![]);
        assert!(index.best_match("anything").is_none());
    }

    #[test]
    fn closely_related_names_score_below_one() {
        let index = FuzzyNameIndex::new(vec![EntityCandidate {
            id: "1".to_string(),
            name: "Canticle of Aeternity".to_string(),
        }]);
        let best = index.best_match("Cantic of Aeternity").unwrap();
        assert!(best.similarity < 1.0 && best.similarity > 0.5);
    }

    #[test]
    fn unrelated_names_score_low() {
        let index = FuzzyNameIndex::new(vec![EntityCandidate {
            id: "1".to_string(),
            name: "Viktor".to_string(),
        }]);
        let best = index.best_match("Zzyzx Quomodocumque").unwrap();
        assert!(best.similarity < 0.6);
    }
}
