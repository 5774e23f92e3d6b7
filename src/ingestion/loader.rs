//! Parses the knowledge-base HTML documents into plain-text sections.
//!
//! Each recognized document describes one service category and follows the
//! same loose structure: an overview (description paragraphs plus service
//! bullet lists), a benefits table with one column per health fund, and
//! contact-information headings. The loader runs one pass per structural
//! shape and emits a [`Section`] per structural unit; everything
//! markup-specific stays behind this module, so the chunker only ever sees
//! plain text.
//!
//! Malformed pieces never fail a whole batch: they are skipped and reported
//! as [`SkippedSection`] diagnostics for the caller to log.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tokio::fs;

use crate::chunk::{EligibilityTag, ServiceCategory};
use crate::profile::{Hmo, MembershipTier};
use crate::types::KbError;

static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));
static UL: Lazy<Selector> = Lazy::new(|| Selector::parse("ul").expect("static selector"));
static LI: Lazy<Selector> = Lazy::new(|| Selector::parse("li").expect("static selector"));
static H3: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("static selector"));
static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("static selector"));
static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("static selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").expect("static selector"));

/// Headings that mark contact-information blocks in the corpus.
const CONTACT_MARKERS: [&str; 3] = ["טלפון", "פרטים", "מידע"];

/// Paragraph prefix introducing the benefits table; covered by the table
/// pass, so the overview pass drops it.
const TABLE_CAPTION_PREFIX: &str = "הטבלה";

/// One structural unit of a source document, ready for chunking.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub text: String,
    pub source_file: String,
    pub category: ServiceCategory,
    /// Empty means the section applies to every profile.
    pub eligibility: Vec<EligibilityTag>,
}

/// A structural unit the loader could not extract.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedSection {
    pub source_file: String,
    pub reason: String,
}

/// The loader's result: extracted sections plus aggregated diagnostics.
#[derive(Clone, Debug, Default)]
pub struct LoadOutcome {
    pub sections: Vec<Section>,
    pub skipped: Vec<SkippedSection>,
}

impl LoadOutcome {
    fn absorb(&mut self, other: LoadOutcome) {
        self.sections.extend(other.sections);
        self.skipped.extend(other.skipped);
    }
}

/// Loads every recognized document under `dir`.
///
/// Fails with [`KbError::MissingKnowledgeBase`] when the directory itself is
/// absent. Individual files that are missing or unreadable contribute a
/// diagnostic instead of failing the batch; the corpus is allowed to be
/// partial.
pub async fn load_dir(dir: impl AsRef<Path>) -> Result<LoadOutcome, KbError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(KbError::MissingKnowledgeBase {
            path: dir.to_path_buf(),
        });
    }

    let mut outcome = LoadOutcome::default();
    for category in ServiceCategory::ALL {
        let path = dir.join(category.source_file());
        match fs::read_to_string(&path).await {
            Ok(html) => outcome.absorb(parse_document(&html, category)),
            Err(err) => outcome.skipped.push(SkippedSection {
                source_file: category.source_file().to_string(),
                reason: format!("unreadable source file: {err}"),
            }),
        }
    }

    tracing::info!(
        sections = outcome.sections.len(),
        skipped = outcome.skipped.len(),
        "knowledge base loaded"
    );
    Ok(outcome)
}

/// Parses a single document. Pure function of its input; diagnostics are
/// collected, never raised.
pub fn parse_document(html: &str, category: ServiceCategory) -> LoadOutcome {
    let doc = Html::parse_document(html);
    let mut outcome = LoadOutcome::default();

    overview_pass(&doc, category, &mut outcome);
    table_pass(&doc, category, &mut outcome);
    contact_pass(&doc, category, &mut outcome);

    outcome
}

fn text_of(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    WS.replace_all(raw.trim(), " ").into_owned()
}

fn push_section(
    outcome: &mut LoadOutcome,
    category: ServiceCategory,
    text: String,
    eligibility: Vec<EligibilityTag>,
) {
    if text.trim().is_empty() {
        return;
    }
    outcome.sections.push(Section {
        text,
        source_file: category.source_file().to_string(),
        category,
        eligibility,
    });
}

/// Description paragraphs and top-level service lists, prefixed with the
/// category label. Lists nested inside the benefits table belong to the
/// table pass and are excluded here.
fn overview_pass(doc: &Html, category: ServiceCategory, outcome: &mut LoadOutcome) {
    let mut parts: Vec<String> = Vec::new();

    for p in doc.select(&P) {
        let text = text_of(p);
        if !text.is_empty() && !text.starts_with(TABLE_CAPTION_PREFIX) {
            parts.push(text);
        }
    }

    for ul in doc.select(&UL) {
        let inside_table = ul
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().name() == "table");
        if inside_table {
            continue;
        }
        let items: Vec<String> = ul
            .select(&LI)
            .map(text_of)
            .filter(|item| !item.is_empty())
            .map(|item| format!("• {item}"))
            .collect();
        if !items.is_empty() {
            parts.push(format!("השירותים כוללים:\n{}", items.join("\n")));
        }
    }

    if !parts.is_empty() {
        let text = format!("{}\n\n{}", category.label(), parts.join("\n\n"));
        push_section(outcome, category, text, Vec::new());
    }
}

/// One section per (table row, health fund) pair. The cell text names the
/// tiers it covers; a cell naming none applies to all three.
fn table_pass(doc: &Html, category: ServiceCategory, outcome: &mut LoadOutcome) {
    let Some(table) = doc.select(&TABLE).next() else {
        return;
    };

    for (row_index, row) in table.select(&TR).skip(1).enumerate() {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        // Service name plus one column per fund.
        if cells.len() < 1 + Hmo::ALL.len() {
            outcome.skipped.push(SkippedSection {
                source_file: category.source_file().to_string(),
                reason: format!(
                    "table row {} has {} cells, expected {}",
                    row_index + 1,
                    cells.len(),
                    1 + Hmo::ALL.len()
                ),
            });
            continue;
        }

        let service_name = text_of(cells[0]);
        if service_name.is_empty() {
            outcome.skipped.push(SkippedSection {
                source_file: category.source_file().to_string(),
                reason: format!("table row {} has an empty service name", row_index + 1),
            });
            continue;
        }

        for (column, hmo) in Hmo::ALL.into_iter().enumerate() {
            let details = text_of(cells[column + 1]);
            if details.is_empty() {
                continue;
            }
            let tiers = tiers_mentioned(&details);
            let text = format!(
                "{} - {}\n\nקופת חולים: {}\n\n{}",
                category.label(),
                service_name,
                hmo.label(),
                details
            );
            let eligibility = tiers
                .into_iter()
                .map(|tier| EligibilityTag::new(hmo, tier))
                .collect();
            push_section(outcome, category, text, eligibility);
        }
    }
}

/// Tiers named in a benefits cell; all three when the cell names none.
fn tiers_mentioned(details: &str) -> Vec<MembershipTier> {
    let mentioned: Vec<MembershipTier> = MembershipTier::ALL
        .into_iter()
        .filter(|tier| details.contains(tier.label()))
        .collect();
    if mentioned.is_empty() {
        MembershipTier::ALL.to_vec()
    } else {
        mentioned
    }
}

/// Contact-information headings and the list that follows each of them.
fn contact_pass(doc: &Html, category: ServiceCategory, outcome: &mut LoadOutcome) {
    let mut blocks: Vec<String> = Vec::new();

    for h3 in doc.select(&H3) {
        let heading = text_of(h3);
        if !CONTACT_MARKERS.iter().any(|marker| heading.contains(marker)) {
            continue;
        }
        let Some(list) = h3
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "ul")
        else {
            continue;
        };
        let items: Vec<String> = list
            .select(&LI)
            .map(text_of)
            .filter(|item| !item.is_empty())
            .collect();
        if !items.is_empty() {
            blocks.push(format!("{heading}\n\n{}", items.join("\n")));
        }
    }

    if !blocks.is_empty() {
        let text = format!(
            "{} - מידע ליצירת קשר\n\n{}",
            category.label(),
            blocks.join("\n\n")
        );
        push_section(outcome, category, text, Vec::new());
    }
}
