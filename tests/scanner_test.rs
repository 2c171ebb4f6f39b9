// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scanner HTTP Tests
 * Fingerprinting and takeover detection against mocked HTTP servers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::Result;
use async_trait::async_trait;
use harrier_scanner::dns::DnsResolver;
use harrier_scanner::fingerprint::FingerprintScanner;
use harrier_scanner::scanners::takeover::TakeoverScanner;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticDns {
    cnames: HashMap<String, String>,
    ips: HashMap<String, Vec<IpAddr>>,
}

#[async_trait]
impl DnsResolver for StaticDns {
    async fn lookup_ips(&self, host: &str) -> Result<Vec<IpAddr>> {
        Ok(self.ips.get(host).cloned().unwrap_or_default())
    }

    async fn lookup_cname(&self, host: &str) -> Result<Option<String>> {
        Ok(self.cnames.get(host).cloned())
    }
}

fn server_host(server: &MockServer) -> String {
    server.uri().trim_start_matches("http://").to_string()
}

#[tokio::test]
async fn test_fingerprint_scanner_reads_title_and_server() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx/1.20.1")
                .insert_header("X-Powered-By", "PHP/8.1")
                .set_body_string("<html><head><title>Acme Portal</title></head></html>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.ico"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scanner = FingerprintScanner::new();
    // HTTPS is tried first and fails against the plain-HTTP mock, so the
    // scanner must fall back to HTTP on its own
    let outcome = scanner.scan(&server_host(&server)).await;

    assert_eq!(outcome.status_code, 200);
    assert_eq!(outcome.title, "Acme Portal");
    assert_eq!(outcome.server, "nginx/1.20.1");
    assert!(outcome.technologies.contains(&"Nginx".to_string()));
    assert!(outcome.technologies.contains(&"PHP".to_string()));
    assert!(outcome.icon_hash.is_empty(), "no favicon, no hash");
}

#[tokio::test]
async fn test_fingerprint_scanner_hashes_favicon() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.ico"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/x-icon")
                .set_body_bytes(vec![0u8, 1, 2, 3, 4, 5, 6, 7]),
        )
        .mount(&server)
        .await;

    let scanner = FingerprintScanner::new();
    let outcome = scanner.scan(&server_host(&server)).await;

    assert!(!outcome.icon_hash.is_empty());
    // Shodan-style hashes are signed 32-bit integers
    outcome.icon_hash.parse::<i32>().unwrap();
}

#[tokio::test]
async fn test_takeover_detected_on_unclaimed_bucket_marker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string("<Error><Code>NoSuchBucket</Code></Error>"),
        )
        .mount(&server)
        .await;

    let host = server_host(&server);
    let dns = Arc::new(StaticDns {
        cnames: [(host.clone(), "assets.s3.amazonaws.com".to_string())]
            .into_iter()
            .collect(),
        ips: [(
            "assets.s3.amazonaws.com".to_string(),
            vec!["52.0.0.1".parse().unwrap()],
        )]
        .into_iter()
        .collect(),
    });

    let scanner = TakeoverScanner::new(dns);
    let finding = scanner.scan(&host).await.unwrap().expect("finding expected");

    assert!(finding.vulnerable);
    assert_eq!(finding.service, "AWS S3");
    assert_eq!(finding.cname, "assets.s3.amazonaws.com");
    assert!(finding.reason.contains("AWS S3"));
    assert_eq!(finding.fingerprints, vec!["NoSuchBucket".to_string()]);
}

#[tokio::test]
async fn test_takeover_not_flagged_when_content_served() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>all good</html>"))
        .mount(&server)
        .await;

    let host = server_host(&server);
    let dns = Arc::new(StaticDns {
        cnames: [(host.clone(), "app.herokuapp.com".to_string())]
            .into_iter()
            .collect(),
        ips: [(
            "app.herokuapp.com".to_string(),
            vec!["52.0.0.2".parse().unwrap()],
        )]
        .into_iter()
        .collect(),
    });

    let scanner = TakeoverScanner::new(dns);
    assert!(scanner.scan(&host).await.unwrap().is_none());
}

#[tokio::test]
async fn test_takeover_ignores_unrelated_cname() {
    let dns = Arc::new(StaticDns {
        cnames: [(
            "www.example.com".to_string(),
            "origin.example-lb.com".to_string(),
        )]
        .into_iter()
        .collect(),
        ips: HashMap::new(),
    });

    let scanner = TakeoverScanner::new(dns);
    assert!(scanner.scan("www.example.com").await.unwrap().is_none());
}
