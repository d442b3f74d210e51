//! Bibliographic catalog (Aleph X-Server) client
//!
//! Resolves a shelf-mark signature and issue year to the canonical serial
//! number and partition of a catalog record.
//!
//! Protocol:
//! - `find` per candidate partition yields a result set (`set_number`, `no_entries`)
//! - `present` per entry of a result set yields a MARC record (`doc_number`,
//!   `fixfield id="008"`, `subfield label="l"`)
//!
//! Responses lacking the expected markers are retried up to the configured
//! bound. A transport failure aborts the resolution immediately.

use crate::config::CatalogSettings;
use crate::error::{IngestError, IngestResult};
use crate::models::ResolvedIdentity;
use crate::xml::Document;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("dlmig/", env!("CARGO_PKG_VERSION"));

/// Fixed field whose text encodes the issue date
const DATE_FIELD_ID: &str = "008";
/// Subfield label carrying the partition code
const PARTITION_LABEL: &str = "l";

/// Result set returned by a `find` query
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultSet {
    set_number: String,
    no_entries: u32,
}

impl ResultSet {
    /// Usable only when both markers are present
    fn from_document(doc: &Document) -> Option<Self> {
        let set_number = doc.first_text("set_number").filter(|s| !s.is_empty())?;
        let no_entries = doc.first_text("no_entries")?.parse().ok()?;
        Some(Self {
            set_number,
            no_entries,
        })
    }
}

/// Bibliographic record returned by a `present` query
#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogRecord {
    doc_number: String,
    date_field: Option<String>,
    partition_code: Option<String>,
}

impl CatalogRecord {
    fn from_document(doc: &Document) -> Option<Self> {
        let doc_number = doc.first_text("doc_number").filter(|s| !s.is_empty())?;

        let date_field = doc
            .elements_named("fixfield")
            .into_iter()
            .find(|e| e.attr("id") == Some(DATE_FIELD_ID))
            .map(|e| e.text());

        // The last labelled subfield wins
        let partition_code = doc
            .elements_named("subfield")
            .into_iter()
            .filter(|e| e.attr("label") == Some(PARTITION_LABEL))
            .last()
            .map(|e| e.text().trim().to_string());

        Some(Self {
            doc_number,
            date_field,
            partition_code,
        })
    }

    fn matches_year(&self, year_hint: &str) -> bool {
        self.date_field
            .as_deref()
            .map(|date| date.contains(year_hint))
            .unwrap_or(false)
    }
}

/// Catalog resolver
pub struct CatalogResolver {
    http_client: reqwest::Client,
    settings: CatalogSettings,
}

impl CatalogResolver {
    pub fn new(settings: CatalogSettings) -> IngestResult<Self> {
        // No request timeout: catalog queries are bounded by the retry count only
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build catalog client: {}", e)))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Resolve `signature` to a catalog identity, disambiguating by `year_hint`
    ///
    /// - `Ok(Some(_))`: first record whose date field contains the year
    /// - `Ok(None)`: nothing matched, or the matched record belongs to another institution
    /// - `Err(CatalogUnreachable)`: transport failure on any query
    pub async fn resolve(&self, signature: &str, year_hint: &str) -> IngestResult<Option<ResolvedIdentity>> {
        let encoded = urlencoding::encode(signature);

        let mut result_sets = Vec::new();
        for partition in &self.settings.partitions {
            match self.find(partition, &encoded).await? {
                Some(set) => {
                    debug!(
                        partition = %partition,
                        set_number = %set.set_number,
                        entries = set.no_entries,
                        "Catalog result set"
                    );
                    result_sets.push((partition.as_str(), set));
                }
                None => debug!(partition = %partition, signature = %signature, "No result set"),
            }
        }

        for (partition, set) in result_sets {
            let entries = set.no_entries.min(self.settings.max_candidates);

            for entry in 1..=entries {
                let record = match self.present(partition, &set.set_number, entry).await? {
                    Some(record) => record,
                    None => {
                        warn!(partition = %partition, entry, "Catalog record unavailable, skipping");
                        continue;
                    }
                };

                if !record.matches_year(year_hint) {
                    warn!(
                        partition = %partition,
                        doc_number = %record.doc_number,
                        year = %year_hint,
                        date_field = record.date_field.as_deref().unwrap_or(""),
                        "Catalog record does not match issue year, skipping"
                    );
                    continue;
                }

                // First record passing the year check decides the outcome
                let code = match record.partition_code {
                    Some(code) if code.starts_with(&self.settings.institution_prefix) => code,
                    other => {
                        warn!(
                            doc_number = %record.doc_number,
                            partition_code = other.as_deref().unwrap_or(""),
                            "Catalog record belongs to another institution"
                        );
                        return Ok(None);
                    }
                };

                let identity = ResolvedIdentity::from_catalog(&record.doc_number, &code);
                match &identity {
                    Some(identity) => info!(
                        signature = %signature,
                        serial = %identity.serial_number(),
                        partition = %identity.partition(),
                        "Catalog record resolved"
                    ),
                    None => warn!(doc_number = %record.doc_number, "Catalog serial number unusable"),
                }
                return Ok(identity);
            }
        }

        Ok(None)
    }

    async fn find(&self, partition: &str, encoded_signature: &str) -> IngestResult<Option<ResultSet>> {
        let url = format!(
            "{}?base={}&op=find&request=sig={}",
            self.settings.base_url, partition, encoded_signature
        );

        for attempt in 1..=self.settings.retry_count {
            if let Some(doc) = self.fetch(&url, partition).await? {
                if let Some(set) = ResultSet::from_document(&doc) {
                    return Ok(Some(set));
                }
            }
            debug!(partition = %partition, attempt, "find response lacks result set markers");
        }

        Ok(None)
    }

    async fn present(&self, partition: &str, set_number: &str, entry: u32) -> IngestResult<Option<CatalogRecord>> {
        let url = format!(
            "{}?op=present&set_no={}&set_entry={:09}&format=marc",
            self.settings.base_url, set_number, entry
        );

        for attempt in 1..=self.settings.retry_count {
            if let Some(doc) = self.fetch(&url, partition).await? {
                if let Some(record) = CatalogRecord::from_document(&doc) {
                    return Ok(Some(record));
                }
            }
            debug!(partition = %partition, entry, attempt, "present response lacks doc_number");
        }

        Ok(None)
    }

    /// GET `url` and parse the body
    ///
    /// Error statuses and unparsable bodies count as responses without
    /// markers (`Ok(None)`); only transport failures are errors.
    async fn fetch(&self, url: &str, partition: &str) -> IngestResult<Option<Document>> {
        debug!(url = %url, "Querying catalog");

        let unreachable = |e: reqwest::Error| IngestError::CatalogUnreachable {
            partition: partition.to_string(),
            message: e.to_string(),
        };

        let response = self.http_client.get(url).send().await.map_err(unreachable)?;
        let status = response.status();
        let body = response.text().await.map_err(unreachable)?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Catalog returned error status");
            return Ok(None);
        }

        match Document::parse(&body) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                debug!(error = %e, "Catalog response is not XML");
                Ok(None)
            }
        }
    }
}
