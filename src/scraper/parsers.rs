use crate::config::ParserConfig;
use crate::models::JobRecord;
use crate::scraper::cleaner::{parse_fuzzy_date, trim_to_words};
use anyhow::Result;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::{debug, trace};

/// Why an entry could not be turned into a record. The entry is skipped,
/// the run goes on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("No link found")]
    NoLinks,
    #[error("Multiple links found ({0})")]
    MultipleLinks(usize),
    #[error("Anchor #{0} leads back to an entry already visited")]
    AnchorCycle(String),
    #[error("Anchor chain longer than {0} hops")]
    AnchorDepth(usize),
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("{} selector: {:?}", css, e))
}

// ── Area locator ──────────────────────────────────────────────────────────────

pub struct AreaLocator {
    tag: String,
    heading: Selector,
}

impl AreaLocator {
    pub fn new(heading_tag: &str) -> Result<Self> {
        let tag = heading_tag.trim().to_lowercase();
        Ok(Self {
            heading: selector(&tag)?,
            tag,
        })
    }

    /// Sibling elements between the heading titled `area_name` and the next
    /// heading of the same level. `None` when the page has no such heading.
    pub fn find_area_jobs<'a>(&self, doc: &'a Html, area_name: &str) -> Option<Vec<ElementRef<'a>>> {
        let target = doc
            .select(&self.heading)
            .find(|h| h.text().collect::<String>().trim() == area_name)?;

        let jobs: Vec<ElementRef<'a>> = target
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|el| el.value().name() != self.tag)
            .collect();

        trace!("{}: {} candidate entries", area_name, jobs.len());
        Some(jobs)
    }
}

// ── Entry parser ──────────────────────────────────────────────────────────────

pub struct EntryParser {
    config: ParserConfig,
    reference: NaiveDate,
    bold: Selector,
    anchor: Selector,
}

impl EntryParser {
    /// `reference` fills in whatever a due date leaves out (usually the year).
    pub fn new(config: &ParserConfig, reference: NaiveDate) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            reference,
            bold: selector("strong")?,
            anchor: selector("a")?,
        })
    }

    pub fn parse<'a>(&self, doc: &'a Html, node: ElementRef<'a>) -> Result<Option<JobRecord>, EntryError> {
        let mut visited = Vec::new();
        self.parse_node(doc, node, &mut visited)
    }

    fn parse_node<'a>(
        &self,
        doc: &'a Html,
        node: ElementRef<'a>,
        visited: &mut Vec<ElementRef<'a>>,
    ) -> Result<Option<JobRecord>, EntryError> {
        visited.push(node);

        let links: Vec<&'a str> = node
            .select(&self.anchor)
            .filter_map(|a| a.value().attr("href"))
            .collect();

        if !self.config.single_link {
            if let Some(target) = links.first().and_then(|href| self.follow_pointer(doc, href)) {
                // The entry is only a pointer; the posting lives at the target.
                if visited.contains(&target) {
                    return Err(EntryError::AnchorCycle(links[0].trim_start_matches('#').to_string()));
                }
                if visited.len() > self.config.max_anchor_depth {
                    return Err(EntryError::AnchorDepth(self.config.max_anchor_depth));
                }
                debug!("Following {} to its entry", links[0]);
                return self.parse_node(doc, target, visited);
            }
        }

        // Too short to be a posting: skipped quietly, links or not.
        if node.children().count() < self.config.min_children {
            return Ok(None);
        }

        if links.is_empty() {
            return Err(EntryError::NoLinks);
        }
        if self.config.single_link && links.len() > 1 {
            return Err(EntryError::MultipleLinks(links.len()));
        }

        let mut bold = node.select(&self.bold).map(|b| {
            let text = b.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() { None } else { Some(text.to_string()) }
        });
        let institute = bold.next().flatten();
        let status = bold.next().flatten();

        let mut texts = node
            .children()
            .filter_map(|child| match child.value() {
                Node::Text(text) => Some(&**text),
                _ => None,
            })
            .filter(|text| !text.trim().is_empty());

        let description = texts.next().and_then(trim_to_words);
        let (date, due) = match texts.next().and_then(trim_to_words) {
            Some(source) => self.split_due(source),
            None => (None, None),
        };

        let links = links
            .into_iter()
            .filter(|href| self.single_link_mode() || self.follow_pointer(doc, href).is_none())
            .map(str::to_string)
            .collect();

        Ok(Some(JobRecord {
            area: String::new(),
            institute,
            status,
            description,
            date,
            due,
            links,
        }))
    }

    fn single_link_mode(&self) -> bool {
        self.config.single_link
    }

    /// Parent element of the named anchor an in-page `#fragment` link points at.
    fn follow_pointer<'a>(&self, doc: &'a Html, href: &str) -> Option<ElementRef<'a>> {
        let fragment = href.strip_prefix('#')?;
        doc.select(&self.anchor)
            .find(|a| {
                let el = a.value();
                el.attr("name") == Some(fragment) || el.attr("id") == Some(fragment)
            })
            .and_then(|a| a.parent())
            .and_then(ElementRef::wrap)
    }

    /// "Review begins Jan 15" → (Jan 15, "Review begins"). Without a date the
    /// whole text is the due note.
    fn split_due(&self, source: String) -> (Option<NaiveDate>, Option<String>) {
        match parse_fuzzy_date(&source, self.reference) {
            Ok(parsed) => (Some(parsed.date), parsed.leading_text()),
            Err(e) => {
                trace!("{}", e);
                (None, Some(source))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
