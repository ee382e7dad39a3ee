use url::Url;

/// Resolves `href` against the page it was found on and strips the fragment,
/// giving the deduplication key for an item. The query string is dropped only
/// when `strip_query` is set; some sites identify articles by it.
///
/// Returns `None` for hrefs that do not resolve to an http(s) URL.
pub fn canonical_link(href: &str, base: &Url, strip_query: bool) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if strip_query {
        url.set_query(None);
    }
    url.set_fragment(None);
    Some(url.to_string())
}
