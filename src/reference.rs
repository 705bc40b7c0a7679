//! Cached access to remote reference data
//!
//! Reference databases publish per-organism gene lists, category
//! definitions and gene → category links as flat tab-separated text.
//! Transport is abstracted behind [`ReferenceSource`] so the engines and
//! the tests never touch the network; [`ReferenceCache`] wraps a source
//! with the behavior every polite client of a public REST service
//! needs:
//!
//! - an enforced minimum delay between outbound calls
//! - bounded retries with backoff, waiting longer after throttling
//!   responses than after transport failures
//! - a time-to-live cache keyed by endpoint, so repeated lookups within
//!   the TTL never re-issue the call
//!
//! A source that stays unreachable after all retries yields an empty
//! payload. The engines treat the resulting empty mappings as a normal
//! "no enrichment possible" outcome rather than an error.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::category::CategoryCodes;
use crate::{GsetError, GsetResult};

/// Transport abstraction over the remote reference service
///
/// Implementations fetch the raw text payload of one endpoint, e.g. an
/// HTTP client against a REST API. Tests substitute in-memory fakes.
pub trait ReferenceSource {
    /// Fetches the payload of `endpoint`
    ///
    /// # Errors
    ///
    /// [`GsetError::Throttled`] for rate-limiting responses,
    /// [`GsetError::ReferenceUnavailable`] for any other failure.
    fn fetch(&self, endpoint: &str) -> GsetResult<String>;
}

/// Staleness, pacing and retry parameters of the cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a cached payload stays valid
    pub ttl: Duration,
    /// Minimum delay between two outbound calls
    pub request_delay: Duration,
    /// Attempts per endpoint before giving up
    pub max_retries: usize,
    /// Wait after a transport failure
    pub retry_delay: Duration,
    /// Wait after a throttling response
    pub throttle_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            request_delay: Duration::from_millis(350),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            throttle_delay: Duration::from_secs(5),
        }
    }
}

struct CacheEntry {
    fetched_at: Instant,
    payload: String,
}

/// A TTL cache in front of a [`ReferenceSource`]
///
/// The cache is the only stateful component of the crate; it is meant
/// to be created once and passed by reference wherever reference data
/// is needed.
pub struct ReferenceCache<S> {
    source: S,
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
    last_call: Mutex<Option<Instant>>,
}

impl<S: ReferenceSource> ReferenceCache<S> {
    /// Wraps `source` with the default configuration
    pub fn new(source: S) -> Self {
        Self::with_config(source, CacheConfig::default())
    }

    /// Wraps `source` with an explicit configuration
    pub fn with_config(source: S, config: CacheConfig) -> Self {
        Self {
            source,
            config,
            entries: Mutex::new(HashMap::new()),
            last_call: Mutex::new(None),
        }
    }

    /// The gene list of an organism: reference identifier → description
    ///
    /// Descriptions are either `"<symbol>; <product>"` or a bare
    /// product text; exactly what [`crate::resolve`] expects as its
    /// reference argument.
    pub fn gene_list(&self, organism: &str) -> HashMap<String, String> {
        let payload = self.get(&format!("list/{organism}"));
        parse_gene_list(&payload, organism)
    }

    /// Category definitions of an organism: category code → label
    pub fn category_labels(&self, organism: &str) -> HashMap<String, String> {
        let payload = self.get(&format!("list/pathway/{organism}"));
        parse_category_labels(&payload)
    }

    /// Gene → category links of an organism
    pub fn gene_links(&self, organism: &str) -> HashMap<String, CategoryCodes> {
        let payload = self.get(&format!("link/pathway/{organism}"));
        parse_gene_links(&payload, organism)
    }

    /// The cached payload of `endpoint`, fetching it if missing or stale
    fn get(&self, endpoint: &str) -> String {
        {
            let entries = self.entries.lock().expect("cache mutex poisoned");
            if let Some(entry) = entries.get(endpoint) {
                if entry.fetched_at.elapsed() < self.config.ttl {
                    debug!(endpoint, "cache hit");
                    return entry.payload.clone();
                }
            }
        }
        let payload = self.fetch_with_retry(endpoint);
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            endpoint.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                payload: payload.clone(),
            },
        );
        payload
    }

    /// Fetches one endpoint, retrying transient failures with backoff
    ///
    /// Gives up after the configured number of attempts and returns an
    /// empty payload instead of raising.
    fn fetch_with_retry(&self, endpoint: &str) -> String {
        for attempt in 1..=self.config.max_retries {
            self.pace();
            match self.source.fetch(endpoint) {
                Ok(payload) => return payload,
                Err(GsetError::Throttled) => {
                    debug!(endpoint, attempt, "throttled, backing off");
                    std::thread::sleep(self.config.throttle_delay);
                }
                Err(err) => {
                    debug!(endpoint, attempt, %err, "fetch failed");
                    std::thread::sleep(self.config.retry_delay);
                }
            }
        }
        warn!(endpoint, "reference source unavailable, returning empty payload");
        String::new()
    }

    /// Enforces the minimum delay between outbound calls
    fn pace(&self) {
        let mut last_call = self.last_call.lock().expect("cache mutex poisoned");
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.config.request_delay {
                std::thread::sleep(self.config.request_delay - elapsed);
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Parses a gene-list payload
///
/// One gene per line: `org:gene_id<TAB>...<TAB>description`. The
/// description with the gene symbol is always the last tab field.
fn parse_gene_list(payload: &str, organism: &str) -> HashMap<String, String> {
    let prefix = format!("{organism}:");
    let mut genes = HashMap::new();
    for line in payload.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            continue;
        }
        let id = fields[0].trim().trim_start_matches(&prefix).to_string();
        let description = fields[fields.len() - 1].trim();
        if !id.is_empty() && !description.is_empty() {
            genes.insert(id, description.to_string());
        }
    }
    genes
}

/// Parses a category-definition payload
///
/// One category per line: `path:code<TAB>label - organism name`; the
/// trailing organism qualifier is dropped from the label.
fn parse_category_labels(payload: &str) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    for line in payload.lines() {
        let Some((code, label)) = line.split_once('\t') else {
            continue;
        };
        let code = code.trim().trim_start_matches("path:").to_string();
        let label = label
            .split(" - ")
            .next()
            .unwrap_or(label)
            .trim()
            .to_string();
        if !code.is_empty() && !label.is_empty() {
            labels.insert(code, label);
        }
    }
    labels
}

/// Parses a gene → category link payload
///
/// One link per line: `org:gene_id<TAB>path:code`; a gene may appear on
/// many lines.
fn parse_gene_links(payload: &str, organism: &str) -> HashMap<String, CategoryCodes> {
    let prefix = format!("{organism}:");
    let mut links: HashMap<String, CategoryCodes> = HashMap::new();
    for line in payload.lines() {
        let Some((gene, code)) = line.split_once('\t') else {
            continue;
        };
        let gene = gene.trim().trim_start_matches(&prefix);
        let code = code.trim().trim_start_matches("path:");
        if gene.is_empty() || code.is_empty() {
            continue;
        }
        links
            .entry(gene.to_string())
            .or_insert_with(SmallVec::new)
            .push(code.to_string());
    }
    links
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source that counts calls and can fail a fixed number
    /// of times before succeeding
    struct FakeSource {
        payload: String,
        calls: AtomicUsize,
        failures: usize,
        throttled: bool,
    }

    impl FakeSource {
        fn ok(payload: &str) -> Self {
            Self {
                payload: payload.to_string(),
                calls: AtomicUsize::new(0),
                failures: 0,
                throttled: false,
            }
        }

        fn failing(failures: usize, throttled: bool, payload: &str) -> Self {
            Self {
                payload: payload.to_string(),
                calls: AtomicUsize::new(0),
                failures,
                throttled,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReferenceSource for FakeSource {
        fn fetch(&self, _endpoint: &str) -> GsetResult<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.throttled {
                    Err(GsetError::Throttled)
                } else {
                    Err(GsetError::ReferenceUnavailable("connection reset".into()))
                }
            } else {
                Ok(self.payload.clone())
            }
        }
    }

    fn fast_config() -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(3600),
            request_delay: Duration::ZERO,
            max_retries: 3,
            retry_delay: Duration::ZERO,
            throttle_delay: Duration::ZERO,
        }
    }

    const GENE_LIST: &str = "eco:b0001\tCDS\t190..255\tthrL; thr operon leader peptide\n\
                             eco:b0002\tCDS\t337..2799\tthrA; bifunctional aspartokinase\n\
                             eco:b0003\thypothetical protein\n\
                             malformed_line\n";

    #[test]
    fn gene_list_parsing() {
        let cache = ReferenceCache::with_config(FakeSource::ok(GENE_LIST), fast_config());
        let genes = cache.gene_list("eco");
        assert_eq!(genes.len(), 3);
        assert_eq!(genes["b0001"], "thrL; thr operon leader peptide");
        assert_eq!(genes["b0003"], "hypothetical protein");
    }

    #[test]
    fn category_label_parsing() {
        let payload = "path:eco00010\tGlycolysis / Gluconeogenesis - Escherichia coli\n\
                       path:eco00020\tCitrate cycle (TCA cycle) - Escherichia coli\n";
        let cache = ReferenceCache::with_config(FakeSource::ok(payload), fast_config());
        let labels = cache.category_labels("eco");
        assert_eq!(labels["eco00010"], "Glycolysis / Gluconeogenesis");
        assert_eq!(labels["eco00020"], "Citrate cycle (TCA cycle)");
    }

    #[test]
    fn gene_link_parsing() {
        let payload = "eco:b0001\tpath:eco00010\n\
                       eco:b0001\tpath:eco00020\n\
                       eco:b0002\tpath:eco00010\n";
        let cache = ReferenceCache::with_config(FakeSource::ok(payload), fast_config());
        let links = cache.gene_links("eco");
        assert_eq!(links["b0001"].len(), 2);
        assert_eq!(links["b0002"].as_slice(), ["eco00010".to_string()]);
    }

    #[test]
    fn cache_hit_skips_the_source() {
        let cache = ReferenceCache::with_config(FakeSource::ok(GENE_LIST), fast_config());
        cache.gene_list("eco");
        cache.gene_list("eco");
        cache.gene_list("eco");
        assert_eq!(cache.source.calls(), 1);
    }

    #[test]
    fn distinct_endpoints_are_cached_separately() {
        let cache = ReferenceCache::with_config(FakeSource::ok(""), fast_config());
        cache.gene_list("eco");
        cache.gene_list("sey");
        cache.category_labels("eco");
        assert_eq!(cache.source.calls(), 3);
    }

    #[test]
    fn expired_entries_are_refetched() {
        let config = CacheConfig {
            ttl: Duration::ZERO,
            ..fast_config()
        };
        let cache = ReferenceCache::with_config(FakeSource::ok(GENE_LIST), config);
        cache.gene_list("eco");
        cache.gene_list("eco");
        assert_eq!(cache.source.calls(), 2);
    }

    #[test]
    fn transient_failures_are_retried() {
        let cache = ReferenceCache::with_config(
            FakeSource::failing(2, false, GENE_LIST),
            fast_config(),
        );
        let genes = cache.gene_list("eco");
        assert_eq!(cache.source.calls(), 3);
        assert_eq!(genes.len(), 3);
    }

    #[test]
    fn throttling_is_retried() {
        let cache = ReferenceCache::with_config(
            FakeSource::failing(1, true, GENE_LIST),
            fast_config(),
        );
        let genes = cache.gene_list("eco");
        assert_eq!(genes.len(), 3);
    }

    #[test]
    fn exhausted_retries_yield_empty_mappings() {
        let cache = ReferenceCache::with_config(
            FakeSource::failing(usize::MAX, false, GENE_LIST),
            fast_config(),
        );
        assert!(cache.gene_list("eco").is_empty());
        assert_eq!(cache.source.calls(), 3);
        // the empty payload is cached as well; no hammering of a dead source
        assert!(cache.gene_list("eco").is_empty());
        assert_eq!(cache.source.calls(), 3);
    }

    #[test]
    fn calls_are_paced() {
        let config = CacheConfig {
            request_delay: Duration::from_millis(30),
            ttl: Duration::ZERO,
            ..fast_config()
        };
        let cache = ReferenceCache::with_config(FakeSource::ok(GENE_LIST), config);
        let start = Instant::now();
        cache.gene_list("eco");
        cache.gene_list("eco");
        cache.gene_list("eco");
        // three calls, two enforced gaps
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
