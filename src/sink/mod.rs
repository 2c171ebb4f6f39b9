// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Result Persistence Adapter
 * Maps pipeline records onto idempotent sink documents
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::errors::SinkError;
use crate::records::{dedup_host, normalize_url, ScanRecord, UrlSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Document types accepted by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Subdomain,
    Port,
    Service,
    Url,
    Crawler,
    Dirscan,
    Takeover,
    Vuln,
    Sensitive,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Subdomain => "subdomain",
            ResultKind::Port => "port",
            ResultKind::Service => "service",
            ResultKind::Url => "url",
            ResultKind::Crawler => "crawler",
            ResultKind::Dirscan => "dirscan",
            ResultKind::Takeover => "takeover",
            ResultKind::Vuln => "vuln",
            ResultKind::Sensitive => "sensitive",
        }
    }
}

/// One sink document
#[derive(Debug, Clone, Serialize)]
pub struct ScanDocument {
    pub task_id: String,
    pub workspace_id: String,
    pub kind: ResultKind,
    pub source: String,
    pub data: Map<String, Value>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert filter: `{task_id, kind}` plus data-field equality conditions
#[derive(Debug, Clone)]
pub struct DedupFilter {
    pub task_id: String,
    pub kind: ResultKind,
    pub fields: Vec<(String, Value)>,
}

/// Opaque durable store. At-least-once delivery with idempotent keys; the
/// store never sees pipeline types, only documents.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append-only write; a duplicate key is tolerated, not an error
    async fn insert(&self, filter: DedupFilter, doc: ScanDocument) -> Result<(), SinkError>;

    /// Update-or-insert keyed by the filter; the update replaces `data`,
    /// `source` and `tags` and refreshes `updated_at`, while task/workspace/
    /// kind/created_at stamps only apply on first insert
    async fn upsert(&self, filter: DedupFilter, doc: ScanDocument) -> Result<(), SinkError>;

    /// Set `{cdn: true, cdn_provider}` on every subdomain row of the task
    /// whose `subdomain` or `domain` field equals `host`; returns the number
    /// of rows touched
    async fn update_cdn(
        &self,
        task_id: &str,
        host: &str,
        provider: &str,
    ) -> Result<u64, SinkError>;
}

/// In-memory store used by tests and the CLI
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<Vec<ScanDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn documents(&self) -> Vec<ScanDocument> {
        self.docs.lock().await.clone()
    }

    pub async fn count(&self, kind: ResultKind) -> usize {
        self.docs
            .lock()
            .await
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }

    fn matches(doc: &ScanDocument, filter: &DedupFilter) -> bool {
        if doc.task_id != filter.task_id || doc.kind != filter.kind {
            return false;
        }
        filter
            .fields
            .iter()
            .all(|(field, value)| doc.data.get(field) == Some(value))
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert(&self, filter: DedupFilter, doc: ScanDocument) -> Result<(), SinkError> {
        let mut docs = self.docs.lock().await;
        if !filter.fields.is_empty() && docs.iter().any(|d| Self::matches(d, &filter)) {
            debug!("Tolerated duplicate insert for kind {}", doc.kind.as_str());
            return Ok(());
        }
        docs.push(doc);
        Ok(())
    }

    async fn upsert(&self, filter: DedupFilter, doc: ScanDocument) -> Result<(), SinkError> {
        let mut docs = self.docs.lock().await;
        if let Some(existing) = docs.iter_mut().find(|d| Self::matches(d, &filter)) {
            existing.data = doc.data;
            existing.source = doc.source;
            existing.tags = doc.tags;
            existing.updated_at = doc.updated_at;
        } else {
            docs.push(doc);
        }
        Ok(())
    }

    async fn update_cdn(
        &self,
        task_id: &str,
        host: &str,
        provider: &str,
    ) -> Result<u64, SinkError> {
        let mut docs = self.docs.lock().await;
        let host_value = Value::String(host.to_string());
        let mut touched = 0;
        for doc in docs.iter_mut() {
            if doc.task_id != task_id || doc.kind != ResultKind::Subdomain {
                continue;
            }
            let matches = doc.data.get("subdomain") == Some(&host_value)
                || doc.data.get("domain") == Some(&host_value);
            if matches {
                doc.data.insert("cdn".to_string(), Value::Bool(true));
                doc.data
                    .insert("cdn_provider".to_string(), Value::String(provider.to_string()));
                doc.updated_at = Utc::now();
                touched += 1;
            }
        }
        Ok(touched)
    }
}

/// Maps pipeline records to documents and drives the store with bounded
/// retries. Failed writes are dropped and counted after the final attempt.
pub struct ResultWriter {
    store: Arc<dyn ResultStore>,
    task_id: String,
    workspace_id: String,
    written: AtomicU64,
    dropped: AtomicU64,
    max_attempts: u32,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn ResultStore>, task_id: &str, workspace_id: &str) -> Self {
        Self {
            store,
            task_id: task_id.to_string(),
            workspace_id: workspace_id.to_string(),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            max_attempts: 3,
        }
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Persist one record; returns false for record kinds the sink ignores
    pub async fn write(&self, record: &ScanRecord) -> bool {
        let Some((kind, source, data, fields, is_upsert)) = self.map_record(record) else {
            return false;
        };

        let now = Utc::now();
        let doc = ScanDocument {
            task_id: self.task_id.clone(),
            workspace_id: self.workspace_id.clone(),
            kind,
            source,
            data,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let filter = DedupFilter {
            task_id: self.task_id.clone(),
            kind,
            fields,
        };

        let mut backoff = Duration::from_millis(100);
        for attempt in 1..=self.max_attempts {
            let result = if is_upsert {
                self.store.upsert(filter.clone(), doc.clone()).await
            } else {
                self.store.insert(filter.clone(), doc.clone()).await
            };

            match result {
                Ok(()) => {
                    self.written.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "Sink write failed (attempt {}/{}): {}",
                        attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    warn!("Dropping record after sink failure: {}", e);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }
        }
        false
    }

    /// Post-hoc CDN flagging once the run is complete
    pub async fn apply_cdn_updates(&self, cdn_info: &[(String, String)]) {
        for (host, provider) in cdn_info {
            match self.store.update_cdn(&self.task_id, host, provider).await {
                Ok(touched) => {
                    debug!("Flagged {} subdomain rows as CDN for {}", touched, host)
                }
                Err(e) => warn!("CDN update failed for {}: {}", host, e),
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn map_record(
        &self,
        record: &ScanRecord,
    ) -> Option<(ResultKind, String, Map<String, Value>, Vec<(String, Value)>, bool)> {
        match record {
            ScanRecord::Subdomain(r) => {
                let data = to_map(json!({
                    "subdomain": r.host,
                    "domain": r.root_domain,
                    "root_domain": r.root_domain,
                    "ips": r.ips,
                    "cnames": r.cnames,
                    "title": r.title,
                    "status_code": r.status_code,
                    "web_server": r.web_server,
                    "technologies": r.technologies,
                    "cdn": r.cdn,
                    "cdn_name": r.cdn_name,
                    "url": r.url,
                    "alive": r.status_code > 0,
                }));
                let fields = vec![("subdomain".to_string(), json!(r.host))];
                Some((ResultKind::Subdomain, r.source.clone(), data, fields, false))
            }

            ScanRecord::PortAlive(r) => {
                let data = to_map(json!({
                    "host": r.host,
                    "ip": r.ip,
                    "port": r.port,
                    "service": r.service,
                }));
                let fields = vec![
                    ("ip".to_string(), json!(r.ip)),
                    ("port".to_string(), json!(r.port)),
                ];
                Some((ResultKind::Port, "gogo".to_string(), data, fields, false))
            }

            ScanRecord::AssetHttp(r) => {
                let host_key = dedup_host(&r.url);
                let data = to_map(json!({
                    "url": r.url,
                    "normalized_url": normalize_url(&r.url),
                    "dedup_host": host_key,
                    "host": r.host,
                    "ip": r.ip,
                    "port": r.port,
                    "title": r.title,
                    "status_code": r.status_code,
                    "server": r.server,
                    "technologies": r.technologies,
                    "fingerprints": r.fingerprints,
                }));
                let fields = vec![("dedup_host".to_string(), json!(host_key))];
                Some((
                    ResultKind::Service,
                    "fingerprint".to_string(),
                    data,
                    fields,
                    true,
                ))
            }

            ScanRecord::Url(r) => {
                let kind = match r.source {
                    UrlSource::Dirscan => ResultKind::Dirscan,
                    UrlSource::Katana | UrlSource::Rad => ResultKind::Crawler,
                };
                let normalized = normalize_url(&r.output);
                let normalized_input = normalize_url(&r.input);
                let data = to_map(json!({
                    "url": normalized,
                    "normalized_url": normalized,
                    "input": normalized_input,
                    "target": normalized_input,
                    "method": r.method,
                    "source": r.source.as_str(),
                    "crawler": r.source.as_str(),
                    "status_code": r.status_code,
                    "status": r.status_code,
                    "content_type": r.content_type,
                    "length": r.length,
                    "size": r.length,
                }));
                let fields = vec![("normalized_url".to_string(), json!(normalized))];
                Some((kind, r.source.as_str().to_string(), data, fields, true))
            }

            ScanRecord::Takeover(r) => {
                let data = to_map(json!({
                    "domain": r.domain,
                    "cname": r.cname,
                    "service": r.service,
                    "vulnerable": r.vulnerable,
                    "fingerprints": r.fingerprints,
                    "reason": r.reason,
                }));
                let fields = vec![("domain".to_string(), json!(r.domain))];
                Some((ResultKind::Takeover, "takeover".to_string(), data, fields, false))
            }

            ScanRecord::Vuln(r) => {
                let data = to_map(json!({
                    "vuln_id": r.vuln_id,
                    "name": r.name,
                    "target": r.target,
                    "severity": r.severity.as_str(),
                    "description": r.description,
                    "evidence": r.evidence,
                    "remediation": r.remediation,
                    "reference": r.reference,
                    "matched_at": r.matched_at,
                }));
                let fields = vec![
                    ("vuln_id".to_string(), json!(r.vuln_id)),
                    ("target".to_string(), json!(r.target)),
                ];
                Some((ResultKind::Vuln, "nuclei".to_string(), data, fields, false))
            }

            ScanRecord::Sensitive(r) => {
                let data = to_map(json!({
                    "target": r.target,
                    "url": r.url,
                    "type": r.info_type,
                    "pattern": r.pattern,
                    "matches": r.matches,
                    "location": r.location,
                    "severity": r.severity.as_str(),
                    "confidence": r.confidence,
                }));
                let fields = vec![
                    ("target".to_string(), json!(r.target)),
                    ("url".to_string(), json!(r.url)),
                    ("type".to_string(), json!(r.info_type)),
                ];
                Some((
                    ResultKind::Sensitive,
                    "sensitive".to_string(),
                    data,
                    fields,
                    false,
                ))
            }

            // Control and context records are not persisted
            ScanRecord::Target(_)
            | ScanRecord::DomainResolve(_)
            | ScanRecord::DomainSkip(_) => None,
        }
    }
}

fn to_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Severity;
    use crate::records::{AssetHttp, SubdomainResult, UrlResult, VulnResult};

    fn writer(store: Arc<MemoryStore>) -> ResultWriter {
        ResultWriter::new(store, "task-1", "ws-1")
    }

    fn subdomain(host: &str) -> ScanRecord {
        ScanRecord::Subdomain(SubdomainResult {
            host: host.to_string(),
            root_domain: "example.com".to_string(),
            source: "bruteforce".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_insert_is_duplicate_tolerant() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&store));

        assert!(w.write(&subdomain("www.example.com")).await);
        assert!(w.write(&subdomain("www.example.com")).await);
        assert_eq!(store.count(ResultKind::Subdomain).await, 1);
    }

    #[tokio::test]
    async fn test_service_upsert_collapses_schemes() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&store));

        let http = ScanRecord::AssetHttp(AssetHttp {
            url: "http://x.com:80/".to_string(),
            host: "x.com".to_string(),
            port: 80,
            title: "first".to_string(),
            ..Default::default()
        });
        let https = ScanRecord::AssetHttp(AssetHttp {
            url: "https://x.com:443/".to_string(),
            host: "x.com".to_string(),
            port: 443,
            title: "second".to_string(),
            ..Default::default()
        });

        w.write(&http).await;
        w.write(&https).await;

        assert_eq!(store.count(ResultKind::Service).await, 1);
        let docs = store.documents().await;
        // Last upsert wins for a given key
        assert_eq!(docs[0].data["title"], "second");
    }

    #[tokio::test]
    async fn test_url_normalization_in_documents() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&store));

        let url = ScanRecord::Url(UrlResult {
            input: "https://x.com:443".to_string(),
            output: "https://x.com:443/login".to_string(),
            source: UrlSource::Katana,
            method: "GET".to_string(),
            status_code: 200,
            content_type: String::new(),
            length: 0,
        });
        w.write(&url).await;

        let docs = store.documents().await;
        assert_eq!(docs[0].kind, ResultKind::Crawler);
        assert_eq!(docs[0].data["url"], "https://x.com/login");
        assert_eq!(docs[0].data["input"], "https://x.com");
    }

    #[tokio::test]
    async fn test_vuln_dedup_key() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&store));

        let vuln = |target: &str| {
            ScanRecord::Vuln(VulnResult {
                vuln_id: "exposed-panel".to_string(),
                name: "Panel".to_string(),
                target: target.to_string(),
                severity: Severity::High,
                description: String::new(),
                evidence: String::new(),
                remediation: String::new(),
                reference: String::new(),
                matched_at: String::new(),
            })
        };

        w.write(&vuln("https://a")).await;
        w.write(&vuln("https://a")).await;
        w.write(&vuln("https://b")).await;
        assert_eq!(store.count(ResultKind::Vuln).await, 2);
    }

    #[tokio::test]
    async fn test_cdn_post_update_matches_either_field() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&store));
        w.write(&subdomain("cdn.example.com")).await;

        // Matches via the `subdomain` field
        w.apply_cdn_updates(&[("cdn.example.com".to_string(), "cloudflare".to_string())])
            .await;
        let docs = store.documents().await;
        assert_eq!(docs[0].data["cdn"], true);
        assert_eq!(docs[0].data["cdn_provider"], "cloudflare");

        // Matches via the `domain` field too
        let touched = store
            .update_cdn("task-1", "example.com", "fastly")
            .await
            .unwrap();
        assert_eq!(touched, 1);
    }

    #[tokio::test]
    async fn test_context_records_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&store));
        let skip = ScanRecord::DomainSkip(crate::records::DomainSkip {
            domain: "cdn.x.com".to_string(),
            is_cdn: true,
            cdn_name: Some("cloudflare".to_string()),
        });
        assert!(!w.write(&skip).await);
        assert!(store.documents().await.is_empty());
    }
}
