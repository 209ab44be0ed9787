//! HTML fragments for enriched annotations
//!
//! Pure functions from fetched records to HTML. Every interpolated value is
//! escaped, except the Wikipedia extract, which is already HTML produced by
//! the remote extracts module.

use crate::clients::commons::{CategoryMember, CommonsImage};
use crate::clients::wikidata::EntityRecord;
use crate::clients::wikipedia::ArticleSummary;
use crate::html::escape;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is in wiki page URLs
const WIKI_TITLE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b':')
    .remove(b'/')
    .remove(b'(')
    .remove(b')')
    .remove(b',')
    .remove(b'!')
    .remove(b'*')
    .remove(b'$')
    .remove(b'@')
    .remove(b';');

const SEE_MORE_TEXT: &str = "See more images";

/// Page URL for `title` under a wiki base such as `https://commons.wikimedia.org/wiki/`
pub fn wiki_page_url(base: &str, title: &str) -> String {
    let title = title.replace(' ', "_");
    format!("{}{}", base, utf8_percent_encode(&title, WIKI_TITLE_SET))
}

/// Thumbnails of the first category members, plus a link to the category
///
/// The "see more" link is left out when the category has no files.
pub fn commons_category_html(members: &[CategoryMember], category_url: &str) -> String {
    let mut html = String::from(r#"<div class="commons-category-annotation"><div class="category-members">"#);

    for member in members {
        html.push_str(&format!(
            r#"<a class="category-member" href="{}"><img src="{}" /></a>"#,
            escape(&member.description_url),
            escape(&member.thumb_url)
        ));
    }
    html.push_str("</div>");

    if !members.is_empty() {
        html.push_str(&format!(
            r#"<a href="{}">{}</a>"#,
            escape(category_url),
            SEE_MORE_TEXT
        ));
    }

    html.push_str("</div>");
    html
}

/// Extract and captioned page image of an article
///
/// A failed fetch renders the bare container; an article without a page
/// image renders the extract alone.
pub fn wikipedia_html(summary: Option<&ArticleSummary>) -> String {
    let mut html = String::from(r#"<div class="wikipedia-article-annotation">"#);

    if let Some(summary) = summary {
        html.push_str(&summary.extract_html);

        if let Some(thumb) = &summary.thumbnail {
            html.push_str(&format!(
                r#"<p class="pageimage"><img src="{}" width="{}" height="{}" /></p>"#,
                escape(&thumb.source),
                thumb.width,
                thumb.height
            ));
        }
    }

    html.push_str("</div>");
    html
}

/// Image, label and description of a Wikidata item
///
/// Label and description each prefer `language` and fall back to English;
/// absent ones are left out, and so is the text block when both are absent.
pub fn wikidata_html(entity: Option<&EntityRecord>, language: &str, image: Option<&CommonsImage>) -> String {
    let mut html = String::from(r#"<div class="wikidata-entity-annotation">"#);

    if let Some(image) = image {
        html.push_str(&format!(
            r#"<div class="wikidata-image"><a class="commons-image" href="{}"><img src="{}" /></a></div>"#,
            escape(&image.description_url),
            escape(&image.thumb_url)
        ));
    }

    let label = entity.and_then(|e| e.label(language));
    let description = entity.and_then(|e| e.description(language));

    if label.is_some() || description.is_some() {
        html.push_str(r#"<div class="text-content">"#);
        if let Some(label) = label {
            html.push_str(&format!(r#"<h2 class="wikidata-label">{}</h2>"#, escape(label)));
        }
        if let Some(description) = description {
            html.push_str(&format!(
                r#"<p class="wikidata-description">{}</p>"#,
                escape(description)
            ));
        }
        html.push_str("</div>");
    }

    html.push_str("</div>");
    html
}
