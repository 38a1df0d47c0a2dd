//! RSS / Atom feed parsing.
//!
//! Streams the document with `quick-xml` and collects the first
//! [`FeedOptions::max_items`] entries in document order. RSS 2.0 and RSS 1.0
//! use `<item>`; Atom uses `<entry>`. Only direct children of an entry are
//! mapped to fields, so nested `<source><title>` or `<author><name>` do not
//! clobber the entry's own title.
//!
//! A malformed document is reported as a [`FeedError`] so the caller can
//! record it against the source and move on.

use crate::models::RawItem;
use crate::utils::strip_markup;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("malformed feed: {0}")]
    Malformed(String),
    #[error("not a feed: root element <{0}>")]
    NotAFeed(String),
    #[error("empty document")]
    Empty,
}

/// Parser knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedOptions {
    /// Keep at most this many entries.
    pub max_items: usize,
    /// Qualified element name holding full encoded content.
    pub encoded_field: String,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            max_items: 5,
            encoded_field: "content:encoded".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Encoded,
    AtomContent,
    Link,
    Date { rank: u8 },
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: String,
    description: String,
    encoded: String,
    atom_content: String,
    /// Text of an RSS `<link>`.
    link: String,
    /// Atom `href`, flagged when it came from `rel="alternate"` or no rel.
    href: Option<(bool, String)>,
    date: Option<(u8, String)>,
}

impl ItemBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Encoded => &mut self.encoded,
            Field::AtomContent => &mut self.atom_content,
            Field::Link => &mut self.link,
            Field::Date { rank } => {
                // A lower rank is a better date source.
                let keep = match self.date.as_mut() {
                    Some((r, value)) if *r == rank => {
                        value.push_str(text);
                        true
                    }
                    Some((r, _)) => *r < rank,
                    None => false,
                };
                if !keep {
                    self.date = Some((rank, text.to_string()));
                }
                return;
            }
        };
        target.push_str(text);
    }

    fn build(self) -> RawItem {
        let content = if self.encoded.trim().is_empty() {
            self.atom_content
        } else {
            self.encoded
        };
        let content = content.trim().to_string();
        RawItem {
            title: strip_markup(&self.title),
            description: self.description.trim().to_string(),
            content_snippet: strip_markup(&content),
            content,
            link: pick_link(self.link.trim(), self.href),
            published: self.date.map(|(_, d)| normalize_date(d.trim())),
        }
    }
}

/// RSS text link first, then the preferred Atom href.
fn pick_link(text: &str, href: Option<(bool, String)>) -> String {
    if !text.is_empty() {
        return text.to_string();
    }
    href.map(|(_, h)| h.trim().to_string()).unwrap_or_default()
}

fn field_for(qname: &str, options: &FeedOptions) -> Option<Field> {
    if qname == options.encoded_field {
        return Some(Field::Encoded);
    }
    match qname {
        "title" => Some(Field::Title),
        "description" | "summary" => Some(Field::Description),
        "content" => Some(Field::AtomContent),
        "link" => Some(Field::Link),
        "pubDate" | "published" => Some(Field::Date { rank: 0 }),
        "dc:date" => Some(Field::Date { rank: 1 }),
        "updated" => Some(Field::Date { rank: 2 }),
        _ => None,
    }
}

/// Normalize RFC 2822 / RFC 3339 dates to RFC 3339 UTC; keep anything else verbatim.
fn normalize_date(raw: &str) -> String {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        })
        .unwrap_or_else(|_| raw.to_string())
}

fn qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    let attr = e.try_get_attribute(key).ok().flatten()?;
    let raw = String::from_utf8_lossy(&attr.value).into_owned();
    Some(unescape(&raw).map(|c| c.into_owned()).unwrap_or(raw))
}

/// Atom `<link href=".."/>`: the first `rel="alternate"` (or no rel) wins,
/// any other rel is kept only until one shows up.
fn atom_link(e: &BytesStart<'_>, builder: &mut ItemBuilder) {
    let Some(href) = attr(e, "href") else {
        return;
    };
    let alternate = matches!(attr(e, "rel").as_deref(), None | Some("alternate"));
    let replace = match &builder.href {
        Some((preferred, _)) => alternate && !preferred,
        None => true,
    };
    if replace {
        builder.href = Some((alternate, href));
    }
}

/// Parse `xml` into at most `options.max_items` [`RawItem`]s.
///
/// # Arguments
///
/// * `xml` - The RSS 2.0, RSS 1.0 (RDF) or Atom document
/// * `options` - Item cap and the element holding full encoded content
///
/// # Returns
///
/// Entries in document order. A cap of zero returns no entries without
/// reading the document.
///
/// # Errors
///
/// [`FeedError::Malformed`] for XML errors or a truncated document,
/// [`FeedError::NotAFeed`] when the root is not `rss`, `rdf:RDF` or `feed`,
/// and [`FeedError::Empty`] when there is no root element at all.
#[instrument(level = "debug", skip_all, fields(bytes = xml.len()))]
pub fn parse_feed(xml: &str, options: &FeedOptions) -> Result<Vec<RawItem>, FeedError> {
    if options.max_items == 0 {
        return Ok(Vec::new());
    }
    let mut reader = Reader::from_str(xml);

    let mut items = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;
    // Depth of the open <item>/<entry>, and its builder.
    let mut current: Option<(usize, ItemBuilder)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| FeedError::Malformed(e.to_string()))?;

        match event {
            Event::Start(e) => {
                let local = local_name(&e);
                if !seen_root {
                    seen_root = true;
                    if !matches!(local.as_str(), "rss" | "RDF" | "feed") {
                        return Err(FeedError::NotAFeed(qname(&e)));
                    }
                }
                if current.is_none() && matches!(local.as_str(), "item" | "entry") {
                    current = Some((stack.len(), ItemBuilder::default()));
                } else if let Some((depth, builder)) = current.as_mut() {
                    if stack.len() == *depth + 1 && local == "link" {
                        atom_link(&e, builder);
                    }
                }
                stack.push(qname(&e));
            }
            Event::Empty(e) => {
                if !seen_root {
                    return Err(FeedError::NotAFeed(qname(&e)));
                }
                if let Some((depth, builder)) = current.as_mut() {
                    if stack.len() == *depth + 1 && local_name(&e) == "link" {
                        atom_link(&e, builder);
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
                let closes_item = matches!(&current, Some((depth, _)) if stack.len() == *depth);
                if closes_item {
                    if let Some((_, builder)) = current.take() {
                        items.push(builder.build());
                    }
                    if items.len() >= options.max_items {
                        break;
                    }
                }
            }
            Event::Text(e) => {
                let raw = String::from_utf8_lossy(&e).into_owned();
                let text = unescape(&raw).map(|c| c.into_owned()).unwrap_or(raw);
                push_field_text(&mut current, &stack, options, &text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                push_field_text(&mut current, &stack, options, &text);
            }
            Event::GeneralRef(e) => {
                let name = String::from_utf8_lossy(&e).into_owned();
                let text = match e.resolve_char_ref() {
                    Ok(Some(ch)) => ch.to_string(),
                    _ => resolve_predefined_entity(&name)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("&{name};")),
                };
                push_field_text(&mut current, &stack, options, &text);
            }
            Event::Eof => {
                if !seen_root {
                    return Err(FeedError::Empty);
                }
                if !stack.is_empty() {
                    return Err(FeedError::Malformed(format!(
                        "unexpected end of document inside <{}>",
                        stack.last().map(String::as_str).unwrap_or_default()
                    )));
                }
                break;
            }
            _ => {}
        }
    }

    debug!(count = items.len(), "Parsed feed items");
    Ok(items)
}

fn push_field_text(
    current: &mut Option<(usize, ItemBuilder)>,
    stack: &[String],
    options: &FeedOptions,
    text: &str,
) {
    let Some((depth, builder)) = current.as_mut() else {
        return;
    };
    let Some(child) = stack.get(*depth + 1) else {
        return;
    };
    if let Some(field) = field_for(child, options) {
        builder.push_text(field, text);
    }
}
