//! Ensembl REST client for gene lookups and species karyotypes.

use crate::annotation::GeneLookup;
use crate::config::{EnsemblConfig, RetryPolicy};
use crate::error::{ErrorCode, ResolveError, ResolveResult};
use crate::gene::{GeneAnnotation, GeneId, Species};
use crate::karyotype::KaryotypeSource;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawResponse {
    status: u16,
    body: String,
}

#[derive(Debug)]
enum Attempt<T> {
    Done(T),
    Retry {
        reason: String,
        after: Option<Duration>,
    },
}

fn with_retries<T>(
    policy: &RetryPolicy,
    what: &str,
    mut attempt: impl FnMut() -> Attempt<T>,
    sleep: impl Fn(Duration),
) -> ResolveResult<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_reason = String::new();
    for n in 1..=max_attempts {
        match attempt() {
            Attempt::Done(value) => return Ok(value),
            Attempt::Retry { reason, after } => {
                if n < max_attempts {
                    let delay = after.unwrap_or_else(|| policy.backoff(n));
                    warn!(what, attempt = n, ?delay, %reason, "retrying Ensembl request");
                    sleep(delay);
                }
                last_reason = reason;
            }
        }
    }
    Err(ResolveError::transport(format!(
        "Giving up on {what} after {max_attempts} attempts: {last_reason}"
    )))
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// `{"error": "..."}` and nothing else.
fn error_only_body(body: &Value) -> Option<&str> {
    let object = body.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get("error").map(|e| e.as_str().unwrap_or_default())
}

fn parse_json(what: &str, raw: &RawResponse) -> ResolveResult<Value> {
    serde_json::from_str(&raw.body).map_err(|e| {
        if (200..300).contains(&raw.status) {
            ResolveError::malformed(format!("Could not parse {what} response: {e}"))
        } else {
            ResolveError::transport(format!("{what} failed with HTTP {}", raw.status))
        }
    })
}

fn parse_lookup(gene: &GeneId, raw: &RawResponse) -> ResolveResult<GeneAnnotation> {
    let what = format!("lookup of '{gene}'");
    let body = parse_json(&what, raw)?;
    if let Some(message) = error_only_body(&body) {
        debug!(%gene, status = raw.status, reason = message, "Ensembl does not know gene id");
        return Ok(GeneAnnotation::Invalid);
    }
    if !(200..300).contains(&raw.status) {
        return Err(ResolveError::transport(format!(
            "{what} failed with HTTP {}",
            raw.status
        )));
    }
    body.get("seq_region_name")
        .and_then(Value::as_str)
        .map(GeneAnnotation::valid)
        .ok_or_else(|| ResolveError::malformed(format!("{what} has no seq_region_name")))
}

fn parse_karyotype(species: &Species, raw: &RawResponse) -> ResolveResult<HashSet<String>> {
    let what = format!("assembly info for '{species}'");
    let body = parse_json(&what, raw)?;
    if !(200..300).contains(&raw.status) {
        return Err(match error_only_body(&body) {
            Some(message) => ResolveError::new(
                ErrorCode::NotFound,
                format!("Ensembl has no {what}: {message}"),
            ),
            None => ResolveError::transport(format!("{what} failed with HTTP {}", raw.status)),
        });
    }
    let regions = body
        .get("karyotype")
        .and_then(Value::as_array)
        .ok_or_else(|| ResolveError::malformed(format!("{what} has no karyotype list")))?;
    regions
        .iter()
        .map(|r| {
            r.as_str()
                .map(str::to_string)
                .ok_or_else(|| ResolveError::malformed(format!("{what} has a non-string karyotype entry")))
        })
        .collect()
}

pub struct EnsemblClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl EnsemblClient {
    pub fn new(config: &EnsemblConfig) -> ResolveResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("probemap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ResolveError::new(ErrorCode::Internal, format!("Could not build HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    fn lookup_url(&self, gene: &GeneId) -> String {
        format!(
            "{}/lookup/id/{gene}?content-type=application/json",
            self.base_url
        )
    }

    fn assembly_url(&self, species: &Species) -> String {
        format!(
            "{}/info/assembly/{}?content-type=application/json",
            self.base_url,
            species.ensembl_name()
        )
    }

    fn send_once(&self, url: &str) -> Attempt<RawResponse> {
        let response = match self.http.get(url).header(ACCEPT, "application/json").send() {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Retry {
                    reason: e.to_string(),
                    after: None,
                };
            }
        };
        let status = response.status().as_u16();
        if is_retryable_status(status) {
            let after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Attempt::Retry {
                reason: format!("HTTP {status}"),
                after,
            };
        }
        match response.text() {
            Ok(body) => Attempt::Done(RawResponse { status, body }),
            Err(e) => Attempt::Retry {
                reason: format!("Could not read response body: {e}"),
                after: None,
            },
        }
    }

    fn get(&self, what: &str, url: &str) -> ResolveResult<RawResponse> {
        with_retries(&self.retry, what, || self.send_once(url), std::thread::sleep)
    }
}

impl GeneLookup for EnsemblClient {
    fn lookup_gene(&self, gene: &GeneId) -> ResolveResult<GeneAnnotation> {
        let raw = self.get("gene lookup", &self.lookup_url(gene))?;
        parse_lookup(gene, &raw)
    }
}

impl KaryotypeSource for EnsemblClient {
    fn fetch_karyotype(&self, species: &Species) -> ResolveResult<HashSet<String>> {
        let raw = self.get("assembly info", &self.assembly_url(species))?;
        parse_karyotype(species, &raw)
    }
}
