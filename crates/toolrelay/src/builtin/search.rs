//! Web search through the DuckDuckGo HTML endpoint, with page text
//! extraction for each hit.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use schemars::JsonSchema;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;

const DEFAULT_CONTENT_CHARS: usize = 1200;
const MAX_CONTENT_CHARS: usize = 4000;
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Whether to include page text, or how many characters of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum IncludeContent {
    Flag(bool),
    Chars(i64),
}

impl Default for IncludeContent {
    fn default() -> Self {
        Self::Flag(true)
    }
}

impl IncludeContent {
    /// Characters of page text per result; zero means titles only.
    pub fn chars(&self) -> usize {
        match self {
            Self::Flag(true) => DEFAULT_CONTENT_CHARS,
            Self::Flag(false) => 0,
            Self::Chars(n) => (*n).clamp(0, MAX_CONTENT_CHARS as i64) as usize,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchArgs {
    #[schemars(description = "What to search for")]
    pub query: String,

    #[schemars(description = "Number of results, 1 to 10")]
    #[serde(default = "default_max_results")]
    pub max_results: i64,

    #[schemars(description = "true for ~1200 characters of page text, false for titles only, or a character count up to 4000")]
    #[serde(default)]
    pub include_content: IncludeContent,
}

fn default_max_results() -> i64 {
    5
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Markdown-ish cleanup applied to extracted page text.
struct TextCleaner {
    images: Regex,
    inline_links: Regex,
    reference_links: Regex,
    footnotes: Regex,
    urls: Regex,
    line_prefix: Regex,
    spaces: Regex,
    blank_runs: Regex,
}

impl TextCleaner {
    fn new() -> Self {
        Self {
            images: Regex::new(r"!\[[^\]]*\]\([^)]+\)").unwrap(),
            inline_links: Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap(),
            reference_links: Regex::new(r"\[([^\]]+)\]\[\d+\]").unwrap(),
            footnotes: Regex::new(r"(?m)^\[\d+\]:.*$").unwrap(),
            urls: Regex::new(r"https?://\S+").unwrap(),
            line_prefix: Regex::new(r"(?m)^[#>\-\*\s]+\s*").unwrap(),
            spaces: Regex::new(r"[ \t\x0C\x0B]+").unwrap(),
            blank_runs: Regex::new(r"\n{3,}").unwrap(),
        }
    }

    /// Drop images, link targets and bare URLs; keep link text.
    fn strip_links(&self, text: &str) -> String {
        let text = self.images.replace_all(text, "");
        let text = self.inline_links.replace_all(&text, "$1");
        let text = self.reference_links.replace_all(&text, "$1");
        let text = self.footnotes.replace_all(&text, "");
        let text = self.urls.replace_all(&text, "");
        let text = self.line_prefix.replace_all(&text, "");
        let text = self.spaces.replace_all(&text, " ");
        let text = self.blank_runs.replace_all(&text, "\n\n");
        text.trim().to_string()
    }
}

/// Strip link markup and URLs from text, leaving readable prose.
pub fn strip_links(text: &str) -> String {
    static CLEANER: OnceLock<TextCleaner> = OnceLock::new();
    CLEANER.get_or_init(TextCleaner::new).strip_links(text)
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars - 1).collect();
    format!("{}…", kept.trim_end())
}

/// Resolve DuckDuckGo's `/l/?uddg=` redirect links to their target.
pub fn decode_result_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    match reqwest::Url::parse(&absolute) {
        Ok(url) => url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .unwrap_or(absolute),
        Err(_) => absolute,
    }
}

/// Pull result titles and target URLs from a results page.
pub fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchHit>, BackendError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a.result__a")
        .map_err(|e| BackendError::Protocol(format!("Bad selector: {:?}", e)))?;

    let mut hits: Vec<SearchHit> = Vec::new();
    for el in document.select(&selector) {
        let title = el.text().collect::<String>().trim().to_string();
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let url = decode_result_url(href);
        if title.is_empty() || hits.iter().any(|h| h.url == url) {
            continue;
        }
        hits.push(SearchHit { title, url });
        if hits.len() >= limit {
            break;
        }
    }

    Ok(hits)
}

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cleaner: TextCleaner,
}

impl SearchClient {
    pub fn new(config: &relayconf::SearchConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            cleaner: TextCleaner::new(),
        }
    }

    /// Run a search and render result blocks.
    #[tracing::instrument(skip(self, args), fields(query = %args.query))]
    pub async fn search(&self, args: &SearchArgs) -> Result<String, BackendError> {
        let max_results = args.max_results.clamp(1, 10) as usize;
        let chars = args.include_content.chars();

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("q", args.query.as_str())])
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0 (compatible; toolrelay)")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Search error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(format!(
                "Search error: results page returned {}",
                status
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("Search error: {}", e)))?;

        let mut hits = parse_results(&html, max_results * 2)?;
        hits.truncate(max_results);
        if hits.is_empty() {
            return Ok("No results found.".to_string());
        }

        let texts: Vec<String> = if chars == 0 {
            vec![String::new(); hits.len()]
        } else {
            futures::future::join_all(hits.iter().map(|hit| self.page_text(&hit.url, chars))).await
        };

        let blocks: Vec<String> = hits
            .iter()
            .zip(texts)
            .map(|(hit, text)| {
                if text.is_empty() {
                    hit.title.clone()
                } else {
                    format!("{}\n\n{}", hit.title, text)
                }
            })
            .collect();

        Ok(blocks.join(BLOCK_SEPARATOR))
    }

    /// Cleaned, truncated page text. Fetch failures yield an empty string.
    async fn page_text(&self, url: &str, chars: usize) -> String {
        let html = match self.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!(url, error = %e, "Skipping page content");
                return String::new();
            }
        };

        let text = html2text::from_read(html.as_bytes(), 100);
        truncate_chars(&self.cleaner.strip_links(&text), chars)
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.http
            .get(url)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0 (compatible; toolrelay)")
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
<html><body>
  <div class="result">
    <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fai&amp;rut=abc">AI research roundup</a></h2>
  </div>
  <div class="result">
    <h2><a class="result__a" href="https://news.example.org/story">Another <b>story</b></a></h2>
  </div>
  <div class="result">
    <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fai&amp;rut=def">Duplicate</a></h2>
  </div>
</body></html>"#;

    #[test]
    fn test_strip_links() {
        let text = "# Heading\n> quoted\n![logo](http://x/logo.png)See [the docs](https://docs.rs) at https://example.com now.\n\n\n\nEnd";
        // Blank lines are folded by the line-prefix pass
        assert_eq!(strip_links(text), "Heading\nquoted\nSee the docs at now.\nEnd");
    }

    #[test]
    fn test_strip_reference_style_links() {
        let text = "Read [the paper][1] today.\n\n[1]: https://arxiv.org/abs/1234";
        assert_eq!(strip_links(text), "Read the paper today.");
    }

    #[test]
    fn test_strip_links_repeated_calls_agree() {
        let text = "Visit https://example.com for [more](https://example.com/more).";
        let first = strip_links(text);
        assert_eq!(first, "Visit for more.");
        for _ in 0..3 {
            assert_eq!(strip_links(text), first);
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 5), "abcd…");
        assert_eq!(truncate_chars("héllo wörld", 6), "héllo…");
        assert_eq!(truncate_chars("anything", 0), "");
    }

    #[test]
    fn test_include_content_chars() {
        assert_eq!(IncludeContent::Flag(true).chars(), 1200);
        assert_eq!(IncludeContent::Flag(false).chars(), 0);
        assert_eq!(IncludeContent::Chars(0).chars(), 0);
        assert_eq!(IncludeContent::Chars(300).chars(), 300);
        assert_eq!(IncludeContent::Chars(9000).chars(), 4000);
    }

    #[test]
    fn test_search_args_defaults() {
        let args: SearchArgs = serde_json::from_value(serde_json::json!({"query": "rust"})).unwrap();
        assert_eq!(args.max_results, 5);
        assert_eq!(args.include_content, IncludeContent::Flag(true));

        let args: SearchArgs =
            serde_json::from_value(serde_json::json!({"query": "rust", "include_content": 250}))
                .unwrap();
        assert_eq!(args.include_content, IncludeContent::Chars(250));
    }

    #[test]
    fn test_decode_result_url() {
        assert_eq!(
            decode_result_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1&rut=x"),
            "https://example.com/a?b=1"
        );
        assert_eq!(decode_result_url("https://plain.example/"), "https://plain.example/");
    }

    #[test]
    fn test_parse_results_dedupes_and_limits() {
        let hits = parse_results(RESULTS_PAGE, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "AI research roundup");
        assert_eq!(hits[0].url, "https://example.com/ai");
        assert_eq!(hits[1].title, "Another story");

        assert_eq!(parse_results(RESULTS_PAGE, 1).unwrap().len(), 1);
        assert!(parse_results("<html></html>", 5).unwrap().is_empty());
    }
}
