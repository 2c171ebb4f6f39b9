// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Third-Party Subdomain Sources
 * fofa / hunter / quake / securitytrails API clients
 *
 * Per-source failures are logged and skipped; an absent credential disables
 * only that source. crtsh is deliberately not wired in (too noisy).
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::config::ApiCredentials;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Default per-source result cap
const API_MAX_RESULTS: usize = 500;

/// A subdomain asset reported by a third-party source
#[derive(Debug, Clone)]
pub struct ApiAsset {
    pub host: String,
    pub ip: Option<String>,
}

/// Aggregates the configured API clients
pub struct ApiManager {
    http: reqwest::Client,
    credentials: ApiCredentials,
}

#[derive(Debug, Deserialize)]
struct FofaResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    results: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct HunterResponse {
    #[serde(default)]
    data: Option<HunterData>,
}

#[derive(Debug, Deserialize)]
struct HunterData {
    #[serde(default)]
    arr: Vec<HunterAsset>,
}

#[derive(Debug, Deserialize)]
struct HunterAsset {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    ip: String,
}

#[derive(Debug, Deserialize)]
struct QuakeResponse {
    #[serde(default)]
    data: Vec<QuakeAsset>,
}

#[derive(Debug, Deserialize)]
struct QuakeAsset {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    ip: String,
}

#[derive(Debug, Deserialize)]
struct SecurityTrailsResponse {
    #[serde(default)]
    subdomains: Vec<String>,
}

impl ApiManager {
    pub fn new(credentials: ApiCredentials) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { http, credentials }
    }

    /// Query one named source; unknown names and missing credentials yield
    /// an empty result, never an error that could poison the pipeline.
    pub async fn search(&self, source: &str, domain: &str) -> Vec<ApiAsset> {
        let outcome = match source {
            "fofa" => self.search_fofa(domain).await,
            "hunter" => self.search_hunter(domain).await,
            "quake" => self.search_quake(domain).await,
            "securitytrails" => self.search_securitytrails(domain).await,
            other => {
                warn!("Unknown subdomain API source: {}", other);
                Ok(Vec::new())
            }
        };

        match outcome {
            Ok(assets) => {
                if !assets.is_empty() {
                    info!("{} returned {} assets for {}", source, assets.len(), domain);
                }
                assets
            }
            Err(e) => {
                warn!("{} query failed for {}: {}", source, domain, e);
                Vec::new()
            }
        }
    }

    async fn search_fofa(&self, domain: &str) -> Result<Vec<ApiAsset>> {
        let (Some(email), Some(key)) = (
            self.credentials.fofa_email.as_deref(),
            self.credentials.fofa_key.as_deref(),
        ) else {
            return Ok(Vec::new());
        };

        let query = BASE64.encode(format!("domain=\"{domain}\""));
        let url = format!(
            "https://fofa.info/api/v1/search/all?email={email}&key={key}&qbase64={query}&size={API_MAX_RESULTS}&fields=host,ip"
        );

        let resp: FofaResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .context("fofa response decode failed")?;

        if resp.error {
            anyhow::bail!("fofa reported an error");
        }

        Ok(resp
            .results
            .into_iter()
            .filter_map(|row| {
                let host = row.first()?.trim().trim_start_matches("https://");
                let host = host.trim_start_matches("http://").to_string();
                if host.is_empty() {
                    return None;
                }
                let ip = row.get(1).filter(|s| !s.is_empty()).cloned();
                Some(ApiAsset { host, ip })
            })
            .collect())
    }

    async fn search_hunter(&self, domain: &str) -> Result<Vec<ApiAsset>> {
        let Some(key) = self.credentials.hunter_key.as_deref() else {
            return Ok(Vec::new());
        };

        let query = BASE64.encode(format!("domain.suffix=\"{domain}\""));
        let url = format!(
            "https://hunter.qianxin.com/openApi/search?api-key={key}&search={query}&page=1&page_size={API_MAX_RESULTS}"
        );

        let resp: HunterResponse = self.http.get(&url).send().await?.json().await?;

        Ok(resp
            .data
            .map(|d| d.arr)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|asset| {
                // Hunter fills either domain or url depending on asset type
                let host = if !asset.domain.is_empty() {
                    asset.domain
                } else {
                    asset.url
                };
                if host.is_empty() {
                    return None;
                }
                let ip = (!asset.ip.is_empty()).then_some(asset.ip);
                Some(ApiAsset { host, ip })
            })
            .collect())
    }

    async fn search_quake(&self, domain: &str) -> Result<Vec<ApiAsset>> {
        let Some(key) = self.credentials.quake_key.as_deref() else {
            return Ok(Vec::new());
        };

        let body = serde_json::json!({
            "query": format!("domain: \"{domain}\""),
            "start": 0,
            "size": API_MAX_RESULTS,
        });

        let resp: QuakeResponse = self
            .http
            .post("https://quake.360.net/api/v3/search/quake_service")
            .header("X-QuakeToken", key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        Ok(resp
            .data
            .into_iter()
            .filter_map(|asset| {
                let host = if !asset.domain.is_empty() {
                    asset.domain
                } else {
                    asset.hostname
                };
                if host.is_empty() {
                    return None;
                }
                let ip = (!asset.ip.is_empty()).then_some(asset.ip);
                Some(ApiAsset { host, ip })
            })
            .collect())
    }

    async fn search_securitytrails(&self, domain: &str) -> Result<Vec<ApiAsset>> {
        let Some(key) = self.credentials.securitytrails_key.as_deref() else {
            return Ok(Vec::new());
        };

        let url = format!("https://api.securitytrails.com/v1/domain/{domain}/subdomains");
        let resp: SecurityTrailsResponse = self
            .http
            .get(&url)
            .header("APIKEY", key)
            .send()
            .await?
            .json()
            .await?;

        Ok(resp
            .subdomains
            .into_iter()
            .take(API_MAX_RESULTS)
            .map(|label| ApiAsset {
                host: format!("{label}.{domain}"),
                ip: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_disable_source() {
        let manager = ApiManager::new(ApiCredentials::default());
        // No credentials configured: every source yields empty, no error
        assert!(manager.search("fofa", "example.com").await.is_empty());
        assert!(manager.search("hunter", "example.com").await.is_empty());
        assert!(manager.search("quake", "example.com").await.is_empty());
        assert!(manager
            .search("securitytrails", "example.com")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_source_ignored() {
        let manager = ApiManager::new(ApiCredentials::default());
        assert!(manager.search("crtsh", "example.com").await.is_empty());
    }

    #[test]
    fn test_fofa_row_decoding() {
        let raw = r#"{"error":false,"results":[["https://api.x.com","1.2.3.4"],["www.x.com",""]]}"#;
        let resp: FofaResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.results.len(), 2);
        assert_eq!(resp.results[0][0], "https://api.x.com");
    }
}
