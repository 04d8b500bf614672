use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::blocking::Client;

static LOC_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<loc\s*>\s*(?:<!\[CDATA\[(.*?)\]\]>|(.*?))\s*</loc\s*>")
        .expect("sitemap loc regex")
});

/// Every `<loc>` value in document order, entities decoded. Sitemap index
/// files list child sitemaps the same way, so those come back as well.
pub fn sitemap_locations(xml: &str) -> Vec<String> {
    LOC_ELEMENT
        .captures_iter(xml)
        .filter_map(|captures| {
            if let Some(cdata) = captures.get(1) {
                return Some(cdata.as_str().trim().to_string());
            }
            let text = captures.get(2)?.as_str().trim();
            Some(html_escape::decode_html_entities(text).into_owned())
        })
        .filter(|location| !location.is_empty())
        .collect()
}

/// Downloads the sitemap at `url` and lists its locations. Used to collect
/// the old links of a redirect mapping from a live site.
pub fn fetch_sitemap(client: &Client, url: &str) -> Result<Vec<String>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to fetch sitemap {url}"))?
        .error_for_status()
        .with_context(|| format!("sitemap request failed for {url}"))?;
    let body = response
        .text()
        .with_context(|| format!("failed to read sitemap body from {url}"))?;
    let locations = sitemap_locations(&body);
    log::info!("{url}: {} location(s)", locations.len());
    Ok(locations)
}
