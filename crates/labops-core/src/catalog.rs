//! Typo-tolerant lab service lookup.

use std::cmp::Ordering;

use strsim::{jaro_winkler, normalized_levenshtein};
use tracing::debug;

use crate::error::CoreResult;
use crate::models::LabService;
use crate::store::EntityStore;

/// Minimum score for a service to be returned.
const MIN_SCORE: f64 = 0.75;

/// Score for a query that names a service's category.
const CATEGORY_SCORE: f64 = 0.9;

/// A ranked catalog hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceMatch {
    pub service: LabService,
    /// 0.0 - 1.0
    pub score: f64,
}

/// Catalog search over active services.
pub struct CatalogSearch<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> CatalogSearch<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Rank active services against `query`, best first.
    ///
    /// An empty query lists every active service by name.
    pub fn search(&self, query: &str, limit: usize) -> CoreResult<Vec<ServiceMatch>> {
        let services = self.store.list_services()?.into_iter().filter(|s| s.active);
        let query = query.trim().to_lowercase();

        let mut matches: Vec<ServiceMatch> = if query.is_empty() {
            let mut all: Vec<ServiceMatch> = services
                .map(|service| ServiceMatch { service, score: 1.0 })
                .collect();
            all.sort_by(|a, b| a.service.name.cmp(&b.service.name));
            all
        } else {
            let mut scored: Vec<ServiceMatch> = services
                .map(|service| ServiceMatch {
                    score: score_service(&service, &query),
                    service,
                })
                .filter(|m| m.score >= MIN_SCORE)
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.service.name.cmp(&b.service.name))
            });
            scored
        };

        matches.truncate(limit);
        debug!(query = %query, hits = matches.len(), "Catalog search");
        Ok(matches)
    }
}

fn score_service(service: &LabService, query: &str) -> f64 {
    let name = service.name.to_lowercase();
    let code = service.code.to_lowercase();

    if code == query || name.contains(query) {
        return 1.0;
    }
    if service.category.to_lowercase().contains(query) {
        return CATEGORY_SCORE;
    }

    std::iter::once(name.as_str())
        .chain(std::iter::once(code.as_str()))
        .chain(name.split_whitespace())
        .map(|candidate| fuzzy_match(query, candidate))
        .fold(0.0, f64::max)
}

/// Weighted Jaro-Winkler and normalized Levenshtein similarity.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}
