//! IP enrichment seam.
//!
//! The pipeline only ever talks to [`EnrichmentProvider`]; the bundled
//! [`StaticEnrichment`] answers every IP with the same demo record. A real
//! firmographic provider plugs in behind the same trait.

use tracing::warn;

use crate::error::Result;
use crate::models::EnrichmentRecord;

/// Maps an IP address to firmographic data.
///
/// Implementations must be side-effect free from the pipeline's point of
/// view: the same IP yields the same record within one render.
pub trait EnrichmentProvider: Send + Sync {
    fn lookup(&self, ip: &str) -> Result<EnrichmentRecord>;
}

/// Demo provider returning one constant record for every IP.
#[derive(Debug, Clone)]
pub struct StaticEnrichment {
    record: EnrichmentRecord,
}

impl StaticEnrichment {
    pub fn new() -> Self {
        Self {
            record: EnrichmentRecord {
                company: "Acme Corp".to_string(),
                location: "San Francisco, CA".to_string(),
                industry: "Software".to_string(),
                employee_count: "201-500".to_string(),
                technologies: vec!["Salesforce".to_string(), "Zendesk".to_string()],
            },
        }
    }

    /// Serve a caller-supplied record instead of the demo one.
    pub fn with_record(record: EnrichmentRecord) -> Self {
        Self { record }
    }
}

impl Default for StaticEnrichment {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrichmentProvider for StaticEnrichment {
    fn lookup(&self, _ip: &str) -> Result<EnrichmentRecord> {
        Ok(self.record.clone())
    }
}

/// Look up `ip`, degrading to [`EnrichmentRecord::placeholder`] on failure.
pub fn enrich(provider: &dyn EnrichmentProvider, ip: &str) -> EnrichmentRecord {
    match provider.lookup(ip) {
        Ok(record) => record,
        Err(e) => {
            warn!(ip, error = %e, "enrichment lookup failed; using placeholder");
            EnrichmentRecord::placeholder()
        }
    }
}
