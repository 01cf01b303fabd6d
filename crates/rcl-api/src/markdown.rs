//! Server-side markdown rendering of card text.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

/// URL schemes allowed in links and images
const SAFE_SCHEMES: &[&str] = &["http:", "https:", "mailto:"];

/// Render card markdown to HTML.
///
/// Raw HTML in the source is escaped and shown as text, and links or images
/// with a scheme other than http, https or mailto lose their target.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: sanitize_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: sanitize_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

fn sanitize_url(url: CowStr<'_>) -> CowStr<'_> {
    let lowered = url.trim().to_ascii_lowercase();
    // Relative links and fragments have no scheme
    let scheme_end = lowered.find(':');
    let has_unsafe_scheme = scheme_end.is_some_and(|end| {
        let before = &lowered[..end];
        !before.contains('/')
            && !before.contains('?')
            && !before.contains('#')
            && !SAFE_SCHEMES.contains(&&lowered[..=end])
    });

    if has_unsafe_scheme {
        CowStr::Borrowed("")
    } else {
        url
    }
}
