//! Original-asset URLs for administrative contexts.
//!
//! Front-end servers may transparently serve the WebP derivative in place of
//! an image. Admin tools need the original bytes, so image URLs built inside
//! an administrative context carry a query marker the server uses to bypass
//! the rewrite.

/// Query marker that asks the server for the original, non-WebP asset.
pub const NO_WEBP_MARKER: &str = "nowebp=1";

/// Where a URL is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestContext {
    Public,
    Admin,
}

/// URL for an asset, marked to bypass WebP rewriting when needed.
///
/// The marker is added iff `context` is [`RequestContext::Admin`] and the
/// asset is an image. A fragment stays at the end; an existing marker is not
/// duplicated.
pub fn original_asset_url(url: &str, context: RequestContext, is_image: bool) -> String {
    if context != RequestContext::Admin || !is_image {
        return url.to_string();
    }

    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let already_marked = base
        .split_once('?')
        .is_some_and(|(_, query)| query.split('&').any(|pair| pair == NO_WEBP_MARKER));
    if already_marked {
        return url.to_string();
    }

    let separator = match base.split_once('?') {
        Some((_, "")) => "",
        Some((_, query)) if query.ends_with('&') => "",
        Some(_) => "&",
        None => "?",
    };
    let mut marked = format!("{base}{separator}{NO_WEBP_MARKER}");
    if let Some(fragment) = fragment {
        marked.push('#');
        marked.push_str(fragment);
    }
    marked
}
