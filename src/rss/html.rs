//! Article extraction from plain HTML listing pages.

use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::types::HtmlSelectors;
use super::util::is_valid_url;
use crate::article::Article;
use crate::TARGET_WEB_REQUEST;

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|err| anyhow!("Invalid CSS selector '{}': {}", selector, err))
}

/// Visible text of an element, whitespace collapsed.
fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts one article per `container` match; relative links resolve against `base_url`.
///
/// Containers without a title or a usable link are skipped.
pub fn parse_html_page(
    body: &str,
    selectors: &HtmlSelectors,
    base_url: &str,
    source_name: &str,
) -> Result<Vec<Article>> {
    let container = compile(&selectors.container)?;
    let title = compile(&selectors.title)?;
    let link = compile(&selectors.link)?;
    let summary = selectors.summary.as_deref().map(compile).transpose()?;
    let base = Url::parse(base_url).with_context(|| format!("Invalid base url {}", base_url))?;

    let document = Html::parse_document(body);
    let mut articles = Vec::new();
    let mut found = 0;

    for element in document.select(&container) {
        found += 1;
        let headline = element
            .select(&title)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty());
        let href = element
            .select(&link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|raw| base.join(raw.trim()).ok())
            .map(String::from)
            .filter(|url| is_valid_url(url));

        let (Some(headline), Some(href)) = (headline, href) else {
            warn!(
                target: TARGET_WEB_REQUEST,
                "Skipping HTML element from {}, missing title or link", source_name
            );
            continue;
        };

        let summary = summary
            .as_ref()
            .and_then(|s| element.select(s).next())
            .map(text_of)
            .unwrap_or_default();
        articles.push(Article::new(&headline, &href, &summary, source_name));
    }

    debug!(
        target: TARGET_WEB_REQUEST,
        "Found {} usable of {} '{}' elements from {}",
        articles.len(),
        found,
        selectors.container,
        source_name
    );
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<div class="story">
  <h3 class="headline">  Fire at
     <em>Jurong East</em> flat </h3>
  <a class="more" href="/singapore/jurong-fire">Read</a>
  <p class="teaser">Residents evacuated.</p>
</div>
<div class="story">
  <h3 class="headline">Missing link</h3>
</div>
<div class="story">
  <h3 class="headline">Punggol ferry</h3>
  <a class="more" href="https://other.example/punggol">Read</a>
</div>
<div class="story">
  <a class="more" href="/no-title">Read</a>
</div>
</body></html>"#;

    fn selectors(summary: Option<&str>) -> HtmlSelectors {
        HtmlSelectors {
            container: "div.story".to_string(),
            title: "h3.headline".to_string(),
            link: "a.more".to_string(),
            summary: summary.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_html_page_resolves_links_and_skips_incomplete() {
        let articles =
            parse_html_page(PAGE, &selectors(Some("p.teaser")), "https://news.example/latest", "Local")
                .unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Fire at Jurong East flat");
        assert_eq!(articles[0].url, "https://news.example/singapore/jurong-fire");
        assert_eq!(articles[0].summary, "Residents evacuated.");
        assert_eq!(articles[0].source, "Local");
        assert_eq!(articles[1].url, "https://other.example/punggol");
        assert_eq!(articles[1].summary, "");
    }

    #[test]
    fn test_parse_html_page_rejects_bad_selector() {
        let mut bad = selectors(None);
        bad.container = "div[".to_string();
        assert!(parse_html_page(PAGE, &bad, "https://news.example/", "Local").is_err());
    }

    #[test]
    fn test_parse_html_page_without_matches_is_empty() {
        let articles =
            parse_html_page("<html><body></body></html>", &selectors(None), "https://x/", "Local")
                .unwrap();
        assert!(articles.is_empty());
    }
}
