//! Query expansion and inter-query pacing.

use harvest_core::config::seconds;
use harvest_core::{HarvestConfig, Query};
use rand::Rng;
use std::time::Duration;

/// Expands terms × locations into an ordered query list.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    terms: Vec<String>,
    locations: Vec<String>,
    delay_min: f64,
    delay_max: f64,
}

impl QueryPlanner {
    pub fn new(terms: Vec<String>, locations: Vec<String>, delay_min: f64, delay_max: f64) -> Self {
        Self {
            terms,
            locations,
            delay_min: delay_min.min(delay_max),
            delay_max: delay_max.max(delay_min),
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            config.terms(),
            config.location_list(),
            config.delay_between_queries_min,
            config.delay_between_queries_max,
        )
    }

    /// Every query, terms outer and locations inner, in input order.
    ///
    /// With no locations each term becomes one bare query.
    pub fn plan(&self) -> Vec<Query> {
        if self.locations.is_empty() {
            return self.terms.iter().map(|t| Query::new(t.as_str(), "")).collect();
        }

        self.terms
            .iter()
            .flat_map(|term| {
                self.locations
                    .iter()
                    .map(move |location| Query::new(term.as_str(), location.as_str()))
            })
            .collect()
    }

    /// A pause drawn uniformly from the configured interval.
    pub fn next_pause(&self) -> Duration {
        if self.delay_max <= self.delay_min {
            return seconds(self.delay_min);
        }
        seconds(rand::thread_rng().gen_range(self.delay_min..=self.delay_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(terms: &[&str], locations: &[&str]) -> QueryPlanner {
        QueryPlanner::new(
            terms.iter().map(|s| (*s).to_string()).collect(),
            locations.iter().map(|s| (*s).to_string()).collect(),
            3.0,
            5.0,
        )
    }

    #[test]
    fn test_plan_terms_outer_locations_inner() {
        let texts: Vec<String> = planner(&["Bakery", "Florist"], &["Springfield", "Shelbyville"])
            .plan()
            .iter()
            .map(Query::text)
            .collect();
        assert_eq!(
            texts,
            vec![
                "Bakery Springfield",
                "Bakery Shelbyville",
                "Florist Springfield",
                "Florist Shelbyville",
            ]
        );
    }

    #[test]
    fn test_plan_without_locations() {
        let queries = planner(&["Bakery", "Florist"], &[]).plan();
        assert_eq!(queries, vec![Query::new("Bakery", ""), Query::new("Florist", "")]);
    }

    #[test]
    fn test_plan_without_terms_is_empty() {
        assert!(planner(&[], &["Springfield"]).plan().is_empty());
    }

    #[test]
    fn test_plan_from_config() {
        let config = HarvestConfig {
            search_term: "Bakery, Florist".to_string(),
            locations: vec!["Springfield".to_string()],
            ..HarvestConfig::default()
        };
        let queries = QueryPlanner::from_config(&config).plan();
        assert_eq!(
            queries,
            vec![
                Query::new("Bakery", "Springfield"),
                Query::new("Florist", "Springfield"),
            ]
        );
    }

    #[test]
    fn test_pause_within_bounds() {
        let planner = planner(&["Bakery"], &[]);
        for _ in 0..50 {
            let pause = planner.next_pause();
            assert!(pause >= Duration::from_secs(3) && pause <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_fixed_pause() {
        let planner = QueryPlanner::new(vec![], vec![], 0.0, 0.0);
        assert_eq!(planner.next_pause(), Duration::ZERO);
    }
}
