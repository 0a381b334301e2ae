//! Geosite domain-list parsing and include expansion.
//!
//! Documents follow the v2fly `domain-list-community` text format:
//!
//! ```text
//! # comment
//! include:google-ads
//! domain:google.com @ads
//! full:www.example.com
//! keyword:facebook
//! regexp:^ads\..*\.com$
//! baidu.com
//! ```
//!
//! Only literal domains end up in a [`ResolvedDomainSet`]; `keyword:` and
//! `regexp:` rules are counted and skipped because object-groups can only
//! hold plain names.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError, TransportError};
use crate::fetch::TextFetcher;
use crate::util::list_locator;

/// Upper bound for the pause between fetch attempts.
const MAX_BACKOFF_MS: u64 = 3_000;

/// Backoff step; attempt `n` waits `n * BACKOFF_STEP_MS` (capped).
const BACKOFF_STEP_MS: u64 = 500;

/// One rule line of a domain-list document. Values are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRule {
    /// `domain:<value>` or a bare value: the domain and its subdomains.
    Domain(String),
    /// `full:<value>`: exactly this name.
    Full(String),
    /// `keyword:<value>`: substring match, unsupported by object-groups.
    Keyword(String),
    /// `regexp:<value>`: pattern match, unsupported by object-groups.
    Regexp(String),
    /// `include:<list>`: every rule of another list.
    Include(String),
}

impl DomainRule {
    /// The rule's value (domain, pattern or list name).
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Domain(v)
            | Self::Full(v)
            | Self::Keyword(v)
            | Self::Regexp(v)
            | Self::Include(v) => v,
        }
    }

    fn typed(kind: &str, value: &str) -> Option<Self> {
        let value = value.to_lowercase();
        match kind {
            "domain" => Some(Self::Domain(value)),
            "full" => Some(Self::Full(value)),
            "keyword" => Some(Self::Keyword(value)),
            "regexp" => Some(Self::Regexp(value)),
            _ => None,
        }
    }
}

/// Parses a domain-list document into rules, in document order.
///
/// Comments, blank lines and `@attribute` annotations are dropped. Lines
/// that reduce to nothing usable are skipped silently.
#[must_use]
pub fn parse_domain_list(text: &str) -> Vec<DomainRule> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<DomainRule> {
    let line = line.split_once('#').map_or(line, |(code, _)| code).trim();
    if line.is_empty() {
        return None;
    }

    let mut tokens = line.split_whitespace();
    let head = tokens.next()?;
    let next = tokens.find(|token| !token.starts_with('@'));

    if let Some(rest) = head.strip_prefix("include:") {
        let target = if rest.is_empty() { next? } else { rest };
        return Some(DomainRule::Include(target.to_lowercase()));
    }
    if let ("include", Some(target)) = (head, next) {
        return Some(DomainRule::Include(target.to_lowercase()));
    }

    // A typed head without any value falls back to a bare name.
    if let Some((kind, rest)) = head.split_once(':') {
        let value = if rest.is_empty() { next } else { Some(rest) };
        if let Some(rule) = value.and_then(|value| DomainRule::typed(kind, value)) {
            return Some(rule);
        }
    }

    Some(DomainRule::Domain(head.to_lowercase()))
}

/// Counters accumulated across a list and everything it includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// `keyword:` rules that were skipped.
    pub skipped_keyword: usize,
    /// `regexp:` rules that were skipped.
    pub skipped_regexp: usize,
    /// `include:` rules that were expanded.
    pub include_count: usize,
    /// Rules parsed across all fetched documents.
    pub total_rules: usize,
}

impl ResolveStats {
    fn absorb(&mut self, other: Self) {
        self.skipped_keyword += other.skipped_keyword;
        self.skipped_regexp += other.skipped_regexp;
        self.include_count += other.include_count;
        self.total_rules += other.total_rules;
    }
}

/// Literal domains of a list with all includes expanded.
///
/// Domains are kept sorted so chunking and command output are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDomainSet {
    /// Unique lowercase domains in ascending order.
    pub domains: BTreeSet<String>,
    /// Aggregated counters.
    pub stats: ResolveStats,
}

impl ResolvedDomainSet {
    /// Number of unique domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Returns `true` if no literal domain was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Domains in iteration (sorted) order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.domains.iter().cloned().collect()
    }

    fn absorb(&mut self, other: Self) {
        self.domains.extend(other.domains);
        self.stats.absorb(other.stats);
    }
}

/// A list whose rules are still being walked.
struct Frame {
    key: String,
    rules: std::vec::IntoIter<DomainRule>,
    resolved: ResolvedDomainSet,
}

impl Frame {
    fn new(key: String, rules: Vec<DomainRule>) -> Self {
        let resolved = ResolvedDomainSet {
            stats: ResolveStats {
                total_rules: rules.len(),
                ..ResolveStats::default()
            },
            ..ResolvedDomainSet::default()
        };
        Self {
            key,
            rules: rules.into_iter(),
            resolved,
        }
    }
}

/// Fetches lists and expands their includes into one domain set.
///
/// Expansion keeps an explicit stack of the lists currently being walked, so
/// a list that includes itself (at any depth) is reported as a cycle instead
/// of recursing forever.
pub struct DomainListResolver<'a, F: TextFetcher + ?Sized> {
    fetcher: &'a F,
    base_url: String,
    timeout: Duration,
    retries: u32,
}

impl<'a, F: TextFetcher + ?Sized> DomainListResolver<'a, F> {
    /// Creates a resolver using the source, timeout and retry settings of `config`.
    #[must_use]
    pub fn new(fetcher: &'a F, config: &SyncConfig) -> Self {
        Self {
            fetcher,
            base_url: config.normalized_base_url(),
            timeout: config.timeout(),
            retries: config.retries.max(1),
        }
    }

    /// Resolves list `key` with all of its includes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fetch`] if any list in the include graph cannot be
    /// fetched, or [`SyncError::IncludeCycle`] if the graph loops.
    pub async fn resolve(&self, key: &str) -> Result<ResolvedDomainSet> {
        self.resolve_within(key, &[]).await
    }

    /// Resolves `key` as if reached through the lists in `stack`.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve); a `key` already on `stack` is a cycle.
    pub async fn resolve_within(&self, key: &str, stack: &[String]) -> Result<ResolvedDomainSet> {
        check_cycle(stack, &[], key)?;
        let rules = self.load_rules(key).await?;
        let mut frames = vec![Frame::new(key.to_string(), rules)];
        let mut result = ResolvedDomainSet::default();

        while let Some(frame) = frames.last_mut() {
            match frame.rules.next() {
                Some(DomainRule::Include(target)) => {
                    frame.resolved.stats.include_count += 1;
                    check_cycle(stack, &frames, &target)?;
                    let rules = self.load_rules(&target).await?;
                    frames.push(Frame::new(target, rules));
                }
                Some(DomainRule::Keyword(_)) => frame.resolved.stats.skipped_keyword += 1,
                Some(DomainRule::Regexp(_)) => frame.resolved.stats.skipped_regexp += 1,
                Some(DomainRule::Domain(domain) | DomainRule::Full(domain)) => {
                    frame.resolved.domains.insert(domain);
                }
                None => {
                    let Some(done) = frames.pop() else { break };
                    match frames.last_mut() {
                        Some(parent) => parent.resolved.absorb(done.resolved),
                        None => result = done.resolved,
                    }
                }
            }
        }

        Ok(result)
    }

    /// Fetches and parses one list, retrying with a capped linear backoff.
    async fn load_rules(&self, key: &str) -> Result<Vec<DomainRule>> {
        let locator = list_locator(&self.base_url, key);
        let mut last_error = TransportError::Other("no fetch attempted".into());

        for attempt in 1..=self.retries {
            match self.fetcher.fetch(&locator, self.timeout).await {
                Ok(text) => {
                    let rules = parse_domain_list(&text);
                    tracing::debug!(
                        list = %key,
                        rules = rules.len(),
                        attempt,
                        "Loaded domain list"
                    );
                    return Ok(rules);
                }
                Err(e) => {
                    tracing::debug!(list = %key, attempt, error = %e, "Domain list fetch failed");
                    last_error = e;
                    if attempt < self.retries {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                }
            }
        }

        Err(SyncError::Fetch {
            locator,
            source: last_error,
        })
    }
}

/// Pause after failed attempt number `attempt` (1-based).
#[must_use]
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_millis((u64::from(attempt) * BACKOFF_STEP_MS).min(MAX_BACKOFF_MS))
}

fn check_cycle(stack: &[String], frames: &[Frame], key: &str) -> Result<()> {
    let path: Vec<&str> = stack
        .iter()
        .map(String::as_str)
        .chain(frames.iter().map(|f| f.key.as_str()))
        .collect();

    if path.contains(&key) {
        let mut cycle = path;
        cycle.push(key);
        return Err(SyncError::IncludeCycle {
            path: cycle.join(" -> "),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct Lists {
        docs: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl Lists {
        fn new(docs: &[(&str, &str)]) -> Self {
            Self {
                docs: docs
                    .iter()
                    .map(|(k, v)| (format!("mock://{k}"), (*v).to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextFetcher for Lists {
        async fn fetch(
            &self,
            locator: &str,
            _timeout: Duration,
        ) -> std::result::Result<String, TransportError> {
            self.calls.lock().unwrap().push(locator.to_string());
            self.docs
                .get(locator)
                .cloned()
                .ok_or_else(|| TransportError::Other("HTTP 404".into()))
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::default().with_base_url("mock://").with_retries(1)
    }

    #[test]
    fn parses_every_rule_kind() {
        let text = "\u{feff}# header\n\
                    include:google-ads\n\
                    include extra\n\
                    domain:Google.com @ads\n\
                    full: www.Example.com\n\
                    keyword:facebook\n\
                    regexp:^ads\\..*\\.com$\n\
                    Baidu.com @cn # trailing comment\n\
                    \n   \n";
        assert_eq!(
            parse_domain_list(text),
            vec![
                DomainRule::Include("google-ads".into()),
                DomainRule::Include("extra".into()),
                DomainRule::Domain("google.com".into()),
                DomainRule::Full("www.example.com".into()),
                DomainRule::Keyword("facebook".into()),
                DomainRule::Regexp("^ads\\..*\\.com$".into()),
                DomainRule::Domain("baidu.com".into()),
            ]
        );
    }

    #[test]
    fn valueless_heads_fall_back_to_bare_names() {
        assert_eq!(
            parse_domain_list("include:\ninclude\nDomain:\n# only comment\n"),
            vec![
                DomainRule::Domain("include".into()),
                DomainRule::Domain("domain:".into()),
            ]
        );
        assert_eq!(
            parse_domain_list("include: @attr target\n"),
            vec![DomainRule::Include("target".into())]
        );
    }

    #[test]
    fn handles_crlf_documents() {
        assert_eq!(
            parse_domain_list("a.com\r\nfull:b.com\r\n"),
            vec![DomainRule::Domain("a.com".into()), DomainRule::Full("b.com".into())]
        );
    }

    #[test]
    fn backoff_is_linear_and_capped() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(4), Duration::from_millis(2_000));
        assert_eq!(backoff(6), Duration::from_millis(3_000));
        assert_eq!(backoff(60), Duration::from_millis(3_000));
    }

    #[tokio::test]
    async fn expands_includes_and_counts_skipped_rules() {
        let lists = Lists::new(&[
            ("root", "a.com\nkeyword:ads\ninclude:child\nfull:b.com\n"),
            ("child", "b.com\nregexp:.*\ninclude:leaf\n"),
            ("leaf", "c.com\nkeyword:x\n"),
        ]);
        let resolver = DomainListResolver::new(&lists, &config());

        let set = resolver.resolve("root").await.unwrap();
        assert_eq!(set.to_vec(), vec!["a.com", "b.com", "c.com"]);
        assert_eq!(
            set.stats,
            ResolveStats {
                skipped_keyword: 2,
                skipped_regexp: 1,
                include_count: 2,
                total_rules: 9,
            }
        );
    }

    #[tokio::test]
    async fn diamond_includes_are_not_cycles() {
        let lists = Lists::new(&[
            ("root", "include:left\ninclude:right\n"),
            ("left", "include:shared\n"),
            ("right", "include:shared\n"),
            ("shared", "s.com\n"),
        ]);
        let set = DomainListResolver::new(&lists, &config())
            .resolve("root")
            .await
            .unwrap();
        assert_eq!(set.to_vec(), vec!["s.com"]);
        assert_eq!(set.stats.include_count, 4);
    }

    #[tokio::test]
    async fn reports_cycle_with_full_path() {
        let lists = Lists::new(&[
            ("cyc-a", "include:cyc-b\n"),
            ("cyc-b", "x.com\ninclude:cyc-c\n"),
            ("cyc-c", "include:cyc-a\n"),
        ]);
        let err = DomainListResolver::new(&lists, &config())
            .resolve("cyc-a")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "include cycle: cyc-a -> cyc-b -> cyc-c -> cyc-a");
        assert_eq!(lists.calls(), 3);
    }

    #[tokio::test]
    async fn self_include_is_a_cycle() {
        let lists = Lists::new(&[("me", "include:me\n")]);
        let err = DomainListResolver::new(&lists, &config())
            .resolve("me")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::IncludeCycle { ref path } if path == "me -> me"));
    }

    #[tokio::test]
    async fn key_on_caller_stack_is_a_cycle() {
        let lists = Lists::new(&[("b", "b.com\n")]);
        let err = DomainListResolver::new(&lists, &config())
            .resolve_within("b", &["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "include cycle: a -> b -> b");
        assert_eq!(lists.calls(), 0);
    }

    #[tokio::test]
    async fn missing_include_fails_the_whole_list() {
        let lists = Lists::new(&[("broken", "ok.com\ninclude:missing\n")]);
        let err = DomainListResolver::new(&lists, &config())
            .resolve("broken")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to fetch mock://missing: HTTP 404");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_attempts_are_exhausted() {
        let lists = Lists::new(&[]);
        let config = config().with_retries(4);
        let started = tokio::time::Instant::now();

        let err = DomainListResolver::new(&lists, &config)
            .resolve("gone")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Fetch { ref locator, .. } if locator == "mock://gone"));
        assert_eq!(lists.calls(), 4);
        // 500 + 1000 + 1500 ms of backoff between four attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    }
}
