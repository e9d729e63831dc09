pub mod enrichment;

pub use enrichment::{EnrichedAttributes, Enricher, LocalEnricher, create_enricher};
