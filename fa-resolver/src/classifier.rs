//! Link classification of rendered annotations
//!
//! An annotation is enrichable only when its rendered HTML is nothing but a
//! single paragraph holding a single link. The check is structural (parsed
//! tree, not text matching) because the link may come out of a template
//! rather than appear literally in the wikitext.
//!
//! The href of that link is then matched against the three recognized
//! targets. The hosts differ, so at most one can match; they are still
//! tried in a fixed order: Commons category, Wikipedia article, Wikidata item.

use crate::models::ClassifiedLink;
use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;
use tracing::debug;

const COMMONS_HOST: &str = "commons.wikimedia.org";
const CATEGORY_PREFIX: &str = "Category:";
const WIKI_PATH_PREFIX: &str = "/wiki/";

/// Class MediaWiki puts on the wrapper div around parser output
const PARSER_OUTPUT_CLASS: &str = "mw-parser-output";

fn wikipedia_host_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9-]*\.wikipedia\.org$").expect("static regex is valid")
    })
}

fn entity_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(Q[0-9]+)\b").expect("static regex is valid"))
}

/// Classify a rendered annotation fragment
///
/// Malformed fragments classify as [`ClassifiedLink::None`]; this never fails.
pub fn classify(rendered: &str) -> ClassifiedLink {
    match lone_link_href(rendered) {
        Some(href) => classify_href(&href),
        None => ClassifiedLink::None,
    }
}

/// Href of the only link in a fragment shaped exactly like `<p><a href=…>…</a></p>`
///
/// Whitespace-only text and comments are ignored at every level. A single
/// `div.mw-parser-output` wrapper around the paragraph is looked through.
pub fn lone_link_href(rendered: &str) -> Option<String> {
    // Dropping an RcDom clears the children of every node below it, so all
    // handles are read while `dom` is still in scope.
    let dom = parse_fragment_dom(rendered)?;
    let nodes = fragment_nodes(&dom);

    let mut top = significant(&nodes);
    if top.len() == 1 && is_parser_output_wrapper(&top[0]) {
        let inner = top[0].children.borrow().clone();
        top = significant(&inner);
    }

    let [paragraph] = top.as_slice() else {
        return None;
    };
    if !is_element(paragraph, "p") {
        return None;
    }

    let children = paragraph.children.borrow().clone();
    let inside = significant(&children);
    let [anchor] = inside.as_slice() else {
        return None;
    };
    if !is_element(anchor, "a") {
        return None;
    }

    attribute(anchor, "href")
}

/// Parse an HTML fragment; a fragment with any parse error yields `None`
fn parse_fragment_dom(rendered: &str) -> Option<RcDom> {
    let dom: RcDom = parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        QualName::new(None, ns!(html), local_name!("body")),
        vec![],
    )
    .one(rendered);

    if !dom.errors.is_empty() {
        debug!(errors = dom.errors.len(), "Rendered annotation is malformed; not classifying");
        return None;
    }

    Some(dom)
}

/// Top-level nodes of a parsed fragment (document > html > fragment nodes)
fn fragment_nodes(dom: &RcDom) -> Vec<Handle> {
    let document_children = dom.document.children.borrow();
    match document_children.first() {
        Some(root) => root.children.borrow().clone(),
        None => Vec::new(),
    }
}

/// Drop comments and whitespace-only text
fn significant(nodes: &[Handle]) -> Vec<Handle> {
    nodes
        .iter()
        .filter(|node| match &node.data {
            NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
            NodeData::Comment { .. } | NodeData::ProcessingInstruction { .. } => false,
            _ => true,
        })
        .cloned()
        .collect()
}

fn is_element(node: &Handle, tag: &str) -> bool {
    matches!(&node.data, NodeData::Element { name, .. } if &*name.local == tag)
}

fn attribute(node: &Handle, attr: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn is_parser_output_wrapper(node: &Handle) -> bool {
    is_element(node, "div")
        && attribute(node, "class")
            .map(|class| class.split_whitespace().any(|c| c == PARSER_OUTPUT_CLASS))
            .unwrap_or(false)
}

/// Match a link target against the recognized remote resources
pub fn classify_href(href: &str) -> ClassifiedLink {
    // MediaWiki renders interwiki links protocol-relative
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    let url = match Url::parse(&absolute) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => url,
        _ => return ClassifiedLink::None,
    };
    let host = match url.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return ClassifiedLink::None,
    };

    if let Some(link) = match_commons_category(&url, &host) {
        return link;
    }
    if let Some(link) = match_wikipedia_article(&url, &host) {
        return link;
    }
    if let Some(link) = match_wikidata_entity(&url, &host) {
        return link;
    }

    ClassifiedLink::None
}

fn match_commons_category(url: &Url, host: &str) -> Option<ClassifiedLink> {
    if host != COMMONS_HOST {
        return None;
    }

    let title = page_title(url)?;
    let name = title.strip_prefix(CATEGORY_PREFIX)?;
    if name.trim().is_empty() {
        return None;
    }

    Some(ClassifiedLink::CommonsCategory { name: title })
}

fn match_wikipedia_article(url: &Url, host: &str) -> Option<ClassifiedLink> {
    if !wikipedia_host_regex().is_match(host) {
        return None;
    }

    let article = url.path().strip_prefix(WIKI_PATH_PREFIX)?;
    let article = decode(article);
    if article.is_empty() {
        return None;
    }

    Some(ClassifiedLink::WikipediaArticle {
        host: host.to_string(),
        article,
    })
}

fn match_wikidata_entity(url: &Url, host: &str) -> Option<ClassifiedLink> {
    if host != "wikidata.org" && host != "www.wikidata.org" {
        return None;
    }

    let path = decode(url.path());
    let query: Vec<String> = url.query_pairs().map(|(_, v)| v.into_owned()).collect();

    std::iter::once(path.as_str())
        .chain(query.iter().map(String::as_str))
        .find_map(|candidate| entity_id_regex().captures(candidate))
        .map(|caps| ClassifiedLink::WikidataEntity {
            id: caps[1].to_string(),
        })
}

/// Page title addressed by a wiki URL, either `/wiki/<title>` or `?title=<title>`
fn page_title(url: &Url) -> Option<String> {
    if let Some(title) = url.path().strip_prefix(WIKI_PATH_PREFIX) {
        return Some(decode(title));
    }

    url.query_pairs()
        .find(|(key, _)| key == "title")
        .map(|(_, value)| value.into_owned())
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
