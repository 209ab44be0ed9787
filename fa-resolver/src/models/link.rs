//! Classified annotation links

use serde::Serialize;

/// What a rendered annotation links to, if it is one of the enrichable kinds
///
/// Derived from the rendered HTML on every request; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedLink {
    /// Not a lone link to a recognized resource
    None,

    /// Commons category page; `name` includes the namespace (`Category:Cats`)
    CommonsCategory { name: String },

    /// Wikipedia article; `host` is the language wiki (`en.wikipedia.org`)
    WikipediaArticle { host: String, article: String },

    /// Wikidata item (`Q146`)
    WikidataEntity { id: String },
}

impl ClassifiedLink {
    pub fn is_none(&self) -> bool {
        matches!(self, ClassifiedLink::None)
    }

    /// Remote data source the enrichment reads from
    ///
    /// This is the name freshness watermarks are recorded under.
    pub fn source(&self) -> Option<&'static str> {
        match self {
            ClassifiedLink::None => None,
            ClassifiedLink::CommonsCategory { .. } => Some(SOURCE_COMMONS),
            ClassifiedLink::WikipediaArticle { .. } => Some(SOURCE_WIKIPEDIA),
            ClassifiedLink::WikidataEntity { .. } => Some(SOURCE_WIKIDATA),
        }
    }
}

pub const SOURCE_COMMONS: &str = "commons";
pub const SOURCE_WIKIPEDIA: &str = "wikipedia";
pub const SOURCE_WIKIDATA: &str = "wikidata";

/// Every source name a watermark may be recorded for
pub const KNOWN_SOURCES: [&str; 3] = [SOURCE_COMMONS, SOURCE_WIKIPEDIA, SOURCE_WIKIDATA];
