use url::Url;

fn origin_authority(target: &Url) -> String {
    let host = target.host_str().unwrap_or_default();
    match target.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Turns an icon `href` into an absolute address. Protocol-relative hrefs take
/// the target's scheme; root-relative and bare-relative hrefs both resolve
/// from the target's origin root.
pub fn resolve_favicon_href(href: &str, target: &Url) -> String {
    let href = href.trim();
    let scheme = target.scheme();

    if href.starts_with("//") {
        format!("{}:{}", scheme, href)
    } else if href.starts_with('/') {
        format!("{}://{}{}", scheme, origin_authority(target), href)
    } else if href.starts_with("http") || href.starts_with("data:") {
        href.to_string()
    } else {
        format!("{}://{}/{}", scheme, origin_authority(target), href)
    }
}

/// Social-preview images are resolved with regular relative-reference rules.
pub fn resolve_image_href(href: &str, target: &Url) -> String {
    let href = href.trim();
    target
        .join(href)
        .map(|resolved| resolved.as_str().to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn root_relative() {
        assert_eq!(
            resolve_favicon_href("/favicon.ico", &page()),
            "https://example.com/favicon.ico"
        );
    }

    #[test]
    fn protocol_relative() {
        assert_eq!(
            resolve_favicon_href("//cdn.example.com/f.ico", &page()),
            "https://cdn.example.com/f.ico"
        );
    }

    #[test]
    fn bare_relative_uses_origin_root() {
        let nested = Url::parse("http://example.com:8080/a/b/c.html").unwrap();
        assert_eq!(
            resolve_favicon_href("static/icon.png", &nested),
            "http://example.com:8080/static/icon.png"
        );
    }

    #[test]
    fn absolute_passes_through() {
        assert_eq!(
            resolve_favicon_href("https://static.example.net/i.png", &page()),
            "https://static.example.net/i.png"
        );
    }

    #[test]
    fn image_resolution_follows_page_path() {
        let nested = Url::parse("https://example.com/blog/post").unwrap();
        assert_eq!(
            resolve_image_href("img/cover.jpg", &nested),
            "https://example.com/blog/img/cover.jpg"
        );
        assert_eq!(
            resolve_image_href("https://cdn.example.com/cover.jpg", &nested),
            "https://cdn.example.com/cover.jpg"
        );
    }
}
