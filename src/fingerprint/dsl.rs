// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Fingerprint DSL Engine
 * Evaluates YAML-declared boolean predicates over HTTP responses
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// One rule: a named technology with a boolean combination of DSL predicates
#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintRule {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// `or` (default): any predicate matches. `and`: all must match.
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub dsl: Vec<String>,
}

/// The response facts the predicates evaluate against
#[derive(Debug, Clone, Default)]
pub struct HttpResponseFacts {
    pub url: String,
    pub status_code: u16,
    pub title: String,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub icon_hash: String,
    pub icon_md5: String,
}

impl HttpResponseFacts {
    fn header(&self, name: &str) -> String {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    fn all_headers(&self) -> String {
        self.headers
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn content_for(&self, source: &str) -> Option<String> {
        match source {
            "body" => Some(self.body.to_lowercase()),
            "header" | "headers" => Some(self.all_headers().to_lowercase()),
            "title" => Some(self.title.to_lowercase()),
            "server" => Some(self.header("Server").to_lowercase()),
            "url" => Some(self.url.to_lowercase()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FingerprintMatch {
    pub technology: String,
    pub category: String,
    pub tags: Vec<String>,
    /// 70 for one matched predicate, 85 for two or more, 95 for a fully
    /// satisfied AND rule
    pub confidence: u8,
    pub matched_dsl: Vec<String>,
}

pub struct DslEngine {
    rules: HashMap<String, FingerprintRule>,
    compiled: Mutex<HashMap<String, Regex>>,
}

impl DslEngine {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            compiled: Mutex::new(HashMap::new()),
        }
    }

    /// Load rules from a YAML mapping `name -> rule`
    pub fn load_rules_str(&mut self, yaml: &str) -> Result<usize> {
        let raw: HashMap<String, Option<FingerprintRule>> =
            serde_yaml::from_str(yaml).context("failed to parse fingerprint rules")?;

        let mut loaded = 0;
        for (name, rule) in raw {
            let Some(mut rule) = rule else { continue };
            rule.name = name.clone();
            if rule.condition.is_empty() {
                rule.condition = "or".to_string();
            }
            self.rules.insert(name, rule);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn load_rules_file(&mut self, path: &Path) -> Result<usize> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules {}", path.display()))?;
        self.load_rules_str(&data)
    }

    /// Load every .yaml/.yml file in a directory; individual file failures
    /// are logged and skipped
    pub fn load_rules_dir(&mut self, dir: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            if ext == "yaml" || ext == "yml" {
                match self.load_rules_file(&path) {
                    Ok(n) => loaded += n,
                    Err(e) => warn!("Skipping rule file {}: {}", path.display(), e),
                }
            }
        }
        loaded
    }

    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate every rule against the response
    pub fn analyze(&self, facts: &HttpResponseFacts) -> Vec<FingerprintMatch> {
        let mut matches = Vec::new();
        for rule in self.rules.values() {
            if let Some(m) = self.match_rule(facts, rule) {
                matches.push(m);
            }
        }
        matches
    }

    fn match_rule(
        &self,
        facts: &HttpResponseFacts,
        rule: &FingerprintRule,
    ) -> Option<FingerprintMatch> {
        if rule.dsl.is_empty() {
            return None;
        }

        let is_and = rule.condition.eq_ignore_ascii_case("and");
        let mut matched = Vec::new();

        for dsl in &rule.dsl {
            if self.evaluate(dsl, facts) {
                matched.push(dsl.clone());
                if !is_and {
                    break;
                }
            } else if is_and {
                return None;
            }
        }

        if matched.is_empty() {
            return None;
        }

        let mut confidence = 70;
        if matched.len() >= 2 {
            confidence = 85;
        }
        if is_and && matched.len() == rule.dsl.len() {
            confidence = 95;
        }

        let tags = rule
            .tags
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Some(FingerprintMatch {
            technology: rule.name.clone(),
            category: rule.category.clone(),
            tags,
            confidence,
            matched_dsl: matched,
        })
    }

    fn evaluate(&self, dsl: &str, facts: &HttpResponseFacts) -> bool {
        let dsl = dsl.trim();
        if let Some(args) = parse_args(dsl, "contains_all") {
            return self.eval_contains(&args, facts, true);
        }
        if let Some(args) = parse_args(dsl, "contains_any") {
            return self.eval_contains(&args, facts, false);
        }
        if let Some(args) = parse_args(dsl, "contains") {
            return self.eval_contains(&args, facts, false);
        }
        if let Some(args) = parse_args(dsl, "title") {
            return args.first().map_or(false, |p| {
                facts.title.to_lowercase().contains(&unquote(p).to_lowercase())
            });
        }
        if let Some(args) = parse_args(dsl, "icon") {
            // First argument is the icon path; the rest are candidate hashes
            return args
                .iter()
                .skip(1)
                .map(|a| unquote(a))
                .any(|hash| facts.icon_hash == hash || facts.icon_md5 == hash);
        }
        if let Some(args) = parse_args(dsl, "status") {
            return args
                .first()
                .and_then(|a| a.trim().parse::<u16>().ok())
                .map_or(false, |code| facts.status_code == code);
        }
        if let Some(args) = parse_args(dsl, "regex") {
            return self.eval_regex(&args, facts);
        }
        if let Some(args) = parse_args(dsl, "header") {
            return self.eval_header(&args, facts);
        }
        false
    }

    fn eval_contains(&self, args: &[String], facts: &HttpResponseFacts, all: bool) -> bool {
        if args.len() < 2 {
            return false;
        }
        let Some(content) = facts.content_for(&unquote(&args[0]).to_lowercase()) else {
            return false;
        };
        let mut patterns = args[1..].iter().map(|a| unquote(a).to_lowercase());
        if all {
            patterns.all(|p| content.contains(&p))
        } else {
            patterns.any(|p| content.contains(&p))
        }
    }

    fn eval_regex(&self, args: &[String], facts: &HttpResponseFacts) -> bool {
        if args.len() < 2 {
            return false;
        }
        let target = unquote(&args[0]).to_lowercase();
        let pattern = unquote(&args[1]);

        let content = match target.as_str() {
            "header" | "headers" => facts.all_headers(),
            "title" => facts.title.clone(),
            _ => facts.body.clone(),
        };

        let mut compiled = self.compiled.lock().unwrap();
        let re = match compiled.get(&pattern) {
            Some(re) => re.clone(),
            None => {
                let Ok(re) = Regex::new(&format!("(?i){pattern}")) else {
                    return false;
                };
                compiled.insert(pattern.clone(), re.clone());
                re
            }
        };
        re.is_match(&content)
    }

    fn eval_header(&self, args: &[String], facts: &HttpResponseFacts) -> bool {
        match args.len() {
            0 => false,
            // header('value'): any header line contains the value
            1 => facts
                .all_headers()
                .to_lowercase()
                .contains(&unquote(&args[0]).to_lowercase()),
            // header(name, value): the named header contains the value
            _ => facts
                .header(&unquote(&args[0]))
                .to_lowercase()
                .contains(&unquote(&args[1]).to_lowercase()),
        }
    }
}

impl Default for DslEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn unquote(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '\'' || c == '"').to_string()
}

/// Split `func(arg1, 'arg 2', ...)` into arguments, respecting quotes
fn parse_args(dsl: &str, func: &str) -> Option<Vec<String>> {
    let prefix = format!("{func}(");
    if !dsl.starts_with(&prefix) {
        return None;
    }
    let inner = &dsl[prefix.len()..];
    let inner = match inner.rfind(')') {
        Some(idx) => &inner[..idx],
        None => inner,
    };

    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in inner.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == ',' => {
                let arg = current.trim().to_string();
                if !arg.is_empty() {
                    args.push(arg);
                }
                current.clear();
            }
            None => current.push(c),
        }
    }
    let arg = current.trim().to_string();
    if !arg.is_empty() {
        args.push(arg);
    }

    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> HttpResponseFacts {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), "nginx/1.20.1".to_string());
        headers.insert("X-Powered-By".to_string(), "PHP/8.1".to_string());
        HttpResponseFacts {
            url: "https://x.com".to_string(),
            status_code: 200,
            title: "Grafana Dashboard".to_string(),
            body: "<html><div class=\"grafana-app\">welcome</div></html>".to_string(),
            headers,
            icon_hash: "1278323681".to_string(),
            icon_md5: "abcd1234".to_string(),
        }
    }

    fn engine(yaml: &str) -> DslEngine {
        let mut e = DslEngine::new();
        e.load_rules_str(yaml).unwrap();
        e
    }

    #[test]
    fn test_or_rule_single_match_confidence_70() {
        let e = engine(
            "Grafana:\n  category: Monitoring\n  dsl:\n    - \"contains(body, 'grafana-app')\"\n    - \"title('nonexistent')\"\n",
        );
        let matches = e.analyze(&facts());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].technology, "Grafana");
        assert_eq!(matches[0].confidence, 70);
    }

    #[test]
    fn test_and_rule_all_match_confidence_95() {
        let e = engine(
            "Grafana:\n  condition: and\n  dsl:\n    - \"contains(body, 'grafana')\"\n    - \"title('grafana')\"\n",
        );
        let matches = e.analyze(&facts());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, 95);
    }

    #[test]
    fn test_and_rule_partial_match_fails() {
        let e = engine(
            "Grafana:\n  condition: and\n  dsl:\n    - \"contains(body, 'grafana')\"\n    - \"title('kibana')\"\n",
        );
        assert!(e.analyze(&facts()).is_empty());
    }

    #[test]
    fn test_icon_predicate() {
        let e = engine(
            "Jenkins:\n  dsl:\n    - \"icon('/favicon.ico', '1278323681')\"\n",
        );
        assert_eq!(e.analyze(&facts()).len(), 1);
    }

    #[test]
    fn test_status_and_header_predicates() {
        let e = engine(
            "PHPStack:\n  dsl:\n    - \"header('X-Powered-By', 'php')\"\nNope:\n  dsl:\n    - \"status(404)\"\n",
        );
        let matches = e.analyze(&facts());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].technology, "PHPStack");
    }

    #[test]
    fn test_regex_predicate_case_insensitive() {
        let e = engine("Nginx:\n  dsl:\n    - \"regex(header, 'NGINX/[0-9.]+')\"\n");
        assert_eq!(e.analyze(&facts()).len(), 1);
    }

    #[test]
    fn test_contains_all() {
        let e = engine(
            "App:\n  dsl:\n    - \"contains_all(body, 'grafana', 'welcome')\"\n",
        );
        assert_eq!(e.analyze(&facts()).len(), 1);

        let e = engine(
            "App:\n  dsl:\n    - \"contains_all(body, 'grafana', 'missing-token')\"\n",
        );
        assert!(e.analyze(&facts()).is_empty());
    }

    #[test]
    fn test_parse_args_quoted_commas() {
        let args = parse_args("contains(body, 'a, with comma', \"b\")", "contains").unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(unquote(&args[1]), "a, with comma");
    }

    #[test]
    fn test_default_condition_is_or() {
        let e = engine("T:\n  dsl:\n    - \"contains(body, 'nope')\"\n    - \"status(200)\"\n");
        let matches = e.analyze(&facts());
        assert_eq!(matches.len(), 1, "OR condition matches on second predicate");
    }
}
