use scraper::{Html, Selector};
use url::Url;

use super::favicon::{resolve_favicon_href, resolve_image_href};
use super::UrlMetadata;
use crate::model::collapse_whitespace;

/// `<meta>` content keyed by its `property` and `name` attributes, in
/// document order.
struct MetaTags {
    entries: Vec<(String, String)>,
}

impl MetaTags {
    fn collect(document: &Html) -> Self {
        let mut entries = Vec::new();
        if let Ok(meta_selector) = Selector::parse("meta[content]") {
            for node in document.select(&meta_selector) {
                let Some(content) = node
                    .value()
                    .attr("content")
                    .map(collapse_whitespace)
                    .filter(|value| !value.is_empty())
                else {
                    continue;
                };
                for attribute in ["property", "name"] {
                    if let Some(key) = node.value().attr(attribute) {
                        entries.push((key.trim().to_ascii_lowercase(), content.clone()));
                    }
                }
            }
        }
        Self { entries }
    }

    /// First content for the highest-priority key present.
    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| {
            self.entries
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, content)| content.clone())
        })
    }
}

fn first_element_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let node = document.select(&selector).next()?;
    let text = collapse_whitespace(&node.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

/// `icon` or `shortcut icon`, in any case.
fn is_icon_rel(rel: &str) -> bool {
    let rel = rel.to_ascii_lowercase();
    let tokens: Vec<&str> = rel.split_whitespace().collect();
    tokens.contains(&"icon")
        && tokens
            .iter()
            .all(|token| *token == "icon" || *token == "shortcut")
}

fn favicon_href(document: &Html) -> Option<String> {
    let link_selector = Selector::parse("link[rel][href]").ok()?;
    document.select(&link_selector).find_map(|node| {
        let rel = node.value().attr("rel")?;
        if !is_icon_rel(rel) {
            return None;
        }
        node.value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string)
    })
}

pub(crate) fn hostname(target: &Url) -> String {
    target.host_str().unwrap_or_default().to_string()
}

/// Best-effort summary of a page. Missing fields fall back to the target's
/// hostname (title, site name) or stay empty.
pub fn extract_metadata(html: &str, target: &Url) -> UrlMetadata {
    let document = Html::parse_document(html);
    let meta = MetaTags::collect(&document);
    let hostname = hostname(target);

    let title = meta
        .first(&["og:title", "twitter:title"])
        .or_else(|| first_element_text(&document, "title"))
        .or_else(|| first_element_text(&document, "h1"))
        .unwrap_or_else(|| hostname.clone());

    let description = meta.first(&["og:description", "twitter:description", "description"]);
    let image = meta
        .first(&["og:image", "twitter:image"])
        .map(|href| resolve_image_href(&href, target));
    let favicon = favicon_href(&document).map(|href| resolve_favicon_href(&href, target));
    let site_name = meta
        .first(&["og:site_name", "application-name"])
        .unwrap_or(hostname);

    UrlMetadata {
        title: Some(title),
        description,
        image,
        favicon,
        site_name: Some(site_name),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn social_title_wins_over_document_title() {
        let html = r#"<html><head>
            <title>Document Title</title>
            <meta content="Social Title" property="og:title">
            </head><body><h1>Heading</h1></body></html>"#;
        let metadata = extract_metadata(html, &target());
        assert_eq!(metadata.title.as_deref(), Some("Social Title"));
    }

    #[test]
    fn title_fallback_chain() {
        let twitter = r#"<meta name="twitter:title" content="Tweet Title"><title>Doc</title>"#;
        assert_eq!(
            extract_metadata(twitter, &target()).title.as_deref(),
            Some("Tweet Title")
        );

        let document = "<html><head><title>\n  Spaced   Title </title></head></html>";
        assert_eq!(
            extract_metadata(document, &target()).title.as_deref(),
            Some("Spaced Title")
        );

        let heading = "<body><h1>Only <em>Heading</em></h1><h1>Second</h1></body>";
        assert_eq!(
            extract_metadata(heading, &target()).title.as_deref(),
            Some("Only Heading")
        );

        assert_eq!(
            extract_metadata("<p>nothing</p>", &target()).title.as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn description_and_image_priority() {
        let html = r#"
            <meta name="description" content="plain description">
            <meta name="twitter:description" content="tweet description">
            <meta name="twitter:image" content="https://img.example.com/t.png">
            <meta property="og:image" content="/cover.png">"#;
        let metadata = extract_metadata(html, &target());
        assert_eq!(metadata.description.as_deref(), Some("tweet description"));
        assert_eq!(
            metadata.image.as_deref(),
            Some("https://example.com/cover.png")
        );
    }

    #[test]
    fn meta_matching_is_case_insensitive_and_skips_empty_content() {
        let html = r#"
            <meta property="OG:DESCRIPTION" content="   ">
            <meta NAME="Description" content="fallback">"#;
        let metadata = extract_metadata(html, &target());
        assert_eq!(metadata.description.as_deref(), Some("fallback"));
        assert_eq!(metadata.image, None);
    }

    #[test]
    fn favicon_in_either_attribute_order() {
        let href_first = r#"<link href="/favicon.ico" rel="icon">"#;
        assert_eq!(
            extract_metadata(href_first, &target()).favicon.as_deref(),
            Some("https://example.com/favicon.ico")
        );

        let shortcut = r#"<link rel="Shortcut Icon" href="//cdn.example.com/f.ico">"#;
        assert_eq!(
            extract_metadata(shortcut, &target()).favicon.as_deref(),
            Some("https://cdn.example.com/f.ico")
        );
    }

    #[test]
    fn non_icon_links_are_ignored() {
        let html = r#"
            <link rel="stylesheet" href="/site.css">
            <link rel="apple-touch-icon" href="/apple.png">"#;
        assert_eq!(extract_metadata(html, &target()).favicon, None);
    }

    #[test]
    fn site_name_priority() {
        let application = r#"<meta name="application-name" content="App">"#;
        assert_eq!(
            extract_metadata(application, &target()).site_name.as_deref(),
            Some("App")
        );

        let social = r#"<meta name="application-name" content="App">
            <meta property="og:site_name" content="Example Site">"#;
        assert_eq!(
            extract_metadata(social, &target()).site_name.as_deref(),
            Some("Example Site")
        );

        assert_eq!(
            extract_metadata("", &target()).site_name.as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn rel_tokens() {
        assert!(is_icon_rel("icon"));
        assert!(is_icon_rel("shortcut icon"));
        assert!(is_icon_rel("ICON"));
        assert!(!is_icon_rel("shortcut"));
        assert!(!is_icon_rel("apple-touch-icon"));
        assert!(!is_icon_rel("icon preload"));
        assert!(!is_icon_rel(""));
    }
}
