// Article fetching
// Downloads a news page and pulls out its paragraph text for embedding


use std::time::Duration;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::{NewsError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const USER_AGENT: &str = "news-match/0.0.1 (Related Article Finder)";

/// Fetch `url` and return the text of its article paragraphs
#[inline]
pub fn fetch_article_text(url: &str) -> Result<String> {
    let parsed = validate_url(url)?;
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
        .user_agent(USER_AGENT)
        .build()
        .into();

    debug!("Fetching article {}", parsed);
    let html = agent
        .get(parsed.as_str())
        .call()
        .and_then(|mut resp| resp.body_mut().read_to_string())
        .map_err(|e| NewsError::Network(format!("Failed to fetch {}: {}", parsed, e)))?;

    let text = extract_article_text(&html);
    if text.is_empty() {
        return Err(NewsError::Network(format!(
            "No article text found at {}",
            parsed
        )));
    }
    Ok(text)
}

/// Only absolute http(s) URLs are accepted
#[inline]
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| NewsError::Config(format!("Invalid URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(NewsError::Config(format!(
            "Unsupported URL scheme: {}",
            scheme
        ))),
    }
}

/// Join the paragraphs inside `<article>`, or every paragraph when the page has none
#[inline]
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in ["article p", "p"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(|p| {
                p.text()
                    .flat_map(str::split_whitespace)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|p| !p.is_empty())
            .collect();

        if !paragraphs.is_empty() {
            return paragraphs.join("\n");
        }
    }

    String::new()
}
