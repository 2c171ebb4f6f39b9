// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Subdomain Takeover Scanner
 * CNAME fingerprint matching against dangling third-party services
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::dns::DnsResolver;
use crate::records::TakeoverResult;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Fingerprint of a service susceptible to subdomain takeover
#[derive(Debug, Clone)]
pub struct ServiceFingerprint {
    pub name: &'static str,
    /// CNAME suffixes pointing at the service
    pub cname_patterns: &'static [&'static str],
    /// Response body markers that confirm an unclaimed resource
    pub http_signatures: &'static [&'static str],
    /// Whether an NXDOMAIN answer on the CNAME target indicates takeover
    pub nxdomain_vulnerable: bool,
}

/// Supported takeover fingerprints
pub const SERVICE_FINGERPRINTS: &[ServiceFingerprint] = &[
    ServiceFingerprint {
        name: "AWS S3",
        cname_patterns: &[".s3.amazonaws.com", ".s3-website", "s3.amazonaws.com"],
        http_signatures: &["NoSuchBucket", "The specified bucket does not exist"],
        nxdomain_vulnerable: false,
    },
    ServiceFingerprint {
        name: "AWS CloudFront",
        cname_patterns: &[".cloudfront.net"],
        http_signatures: &["ERROR: The request could not be satisfied"],
        nxdomain_vulnerable: false,
    },
    ServiceFingerprint {
        name: "Azure Web Apps",
        cname_patterns: &[".azurewebsites.net", ".azure-mobile.net"],
        http_signatures: &["404 Web Site not found"],
        nxdomain_vulnerable: true,
    },
    ServiceFingerprint {
        name: "Azure Traffic Manager",
        cname_patterns: &[".trafficmanager.net"],
        http_signatures: &[],
        nxdomain_vulnerable: true,
    },
    ServiceFingerprint {
        name: "GitHub Pages",
        cname_patterns: &[".github.io", "github.map.fastly.net"],
        http_signatures: &["There isn't a GitHub Pages site here"],
        nxdomain_vulnerable: false,
    },
    ServiceFingerprint {
        name: "Heroku",
        cname_patterns: &[".herokuapp.com", ".herokudns.com"],
        http_signatures: &["No such app", "herokucdn.com/error-pages/"],
        nxdomain_vulnerable: false,
    },
    ServiceFingerprint {
        name: "Shopify",
        cname_patterns: &[".myshopify.com"],
        http_signatures: &["Sorry, this shop is currently unavailable"],
        nxdomain_vulnerable: false,
    },
    ServiceFingerprint {
        name: "Fastly",
        cname_patterns: &[".fastly.net", ".fastlylb.net"],
        http_signatures: &["Fastly error: unknown domain"],
        nxdomain_vulnerable: false,
    },
    ServiceFingerprint {
        name: "Pantheon",
        cname_patterns: &[".pantheonsite.io"],
        http_signatures: &["The gods are wise, but do not know of the site"],
        nxdomain_vulnerable: false,
    },
    ServiceFingerprint {
        name: "Tumblr",
        cname_patterns: &[".tumblr.com", "domains.tumblr.com"],
        http_signatures: &["Whatever you were looking for doesn't currently exist"],
        nxdomain_vulnerable: false,
    },
];

/// Find the fingerprint whose CNAME pattern matches the record tail
pub fn match_cname(cname: &str) -> Option<&'static ServiceFingerprint> {
    let cname = cname.to_lowercase();
    SERVICE_FINGERPRINTS
        .iter()
        .find(|fp| fp.cname_patterns.iter().any(|p| cname.contains(p)))
}

pub struct TakeoverScanner {
    dns: Arc<dyn DnsResolver>,
    http: reqwest::Client,
}

impl TakeoverScanner {
    pub fn new(dns: Arc<dyn DnsResolver>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .unwrap_or_default();
        Self { dns, http }
    }

    /// A host is vulnerable iff its CNAME matches a known service AND the
    /// HTTP fetch shows the service's unclaimed marker (or an NXDOMAIN-like
    /// failure for services where that is conclusive).
    pub async fn scan(&self, domain: &str) -> Result<Option<TakeoverResult>> {
        let Some(cname) = self.dns.lookup_cname(domain).await? else {
            return Ok(None);
        };

        let Some(fingerprint) = match_cname(&cname) else {
            debug!("CNAME {} for {} matches no takeover service", cname, domain);
            return Ok(None);
        };

        // CNAME target resolution; empty answer is the NXDOMAIN-like signal
        let target_resolves = !self.dns.lookup_ips(&cname).await.unwrap_or_default().is_empty();

        let mut matched_signatures = Vec::new();
        let mut reason = String::new();
        let mut vulnerable = false;

        if !target_resolves && fingerprint.nxdomain_vulnerable {
            vulnerable = true;
            reason = format!("CNAME {} does not resolve (NXDOMAIN) for service {}", cname, fingerprint.name);
        } else if !fingerprint.http_signatures.is_empty() {
            let body = self.fetch_body(domain).await;
            match body {
                Some(body) => {
                    for signature in fingerprint.http_signatures {
                        if body.contains(signature) {
                            matched_signatures.push(signature.to_string());
                        }
                    }
                    if !matched_signatures.is_empty() {
                        vulnerable = true;
                        reason = format!(
                            "Response contains unclaimed-resource marker for {}: {:?}",
                            fingerprint.name, matched_signatures
                        );
                    }
                }
                None if fingerprint.nxdomain_vulnerable => {
                    vulnerable = true;
                    reason = format!("Host unreachable with dangling CNAME to {}", fingerprint.name);
                }
                None => {}
            }
        }

        if !vulnerable {
            return Ok(None);
        }

        info!(
            "Potential subdomain takeover: {} -> {} ({})",
            domain, cname, fingerprint.name
        );

        Ok(Some(TakeoverResult {
            domain: domain.to_string(),
            cname,
            service: fingerprint.name.to_string(),
            vulnerable: true,
            fingerprints: matched_signatures,
            reason,
        }))
    }

    async fn fetch_body(&self, host: &str) -> Option<String> {
        for scheme in ["https", "http"] {
            let url = format!("{scheme}://{host}/");
            if let Ok(resp) = self.http.get(&url).send().await {
                if let Ok(body) = resp.text().await {
                    return Some(body);
                }
            }
        }
        None
    }
}
