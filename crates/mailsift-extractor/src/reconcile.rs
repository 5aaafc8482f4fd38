//! Reconciliation: fold a fragment sequence into one canonical record
//!
//! Fragments are routed by class label:
//!
//! - entity classes (`person`, `company`, `project`, `keyword`) add their
//!   matched text to a set
//! - scalar classes (`deadline`, `action_item`) set one field, last writer wins
//! - attribute-bearing classes (`header_info`, `analysis_result`, `email_info`,
//!   `email_meta`, `email`) overwrite the attribute-level slot of every field
//!   they name, last writer wins
//!
//! Unknown classes and unknown attribute keys are ignored. For scalar fields an
//! attribute-level value beats the scalar-class slot; list fields take the
//! union of both sources.

use crate::error::ExtractorError;
use crate::honorific::HonorificTable;
use crate::types::Highlight;
use mailsift_domain::{
    parse_received_at, AttributeValue, CanonicalRecord, ExtractionFragment, Importance,
    RecordField, SchemaViolation, SourceSpan, UNKNOWN_SENDER, UNKNOWN_SUBJECT,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Person,
    Company,
    Project,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FragmentClass {
    Entity(EntityKind),
    Scalar(RecordField),
    Attributes,
    Unknown,
}

impl FragmentClass {
    fn of(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "person" => FragmentClass::Entity(EntityKind::Person),
            "company" => FragmentClass::Entity(EntityKind::Company),
            "project" => FragmentClass::Entity(EntityKind::Project),
            "keyword" => FragmentClass::Entity(EntityKind::Keyword),
            "deadline" => FragmentClass::Scalar(RecordField::Deadline),
            "action_item" => FragmentClass::Scalar(RecordField::ActionRequired),
            "header_info" | "analysis_result" | "email_info" | "email_meta" | "email" => {
                FragmentClass::Attributes
            }
            _ => FragmentClass::Unknown,
        }
    }
}

/// Output of reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// The validated record
    pub record: CanonicalRecord,

    /// Spans that survived normalization, ordered by position
    pub highlights: Vec<Highlight>,

    /// Fragments that contributed at least one value
    pub recognized: usize,
}

#[derive(Debug, Default)]
struct Accumulator {
    attributes: BTreeMap<RecordField, AttributeValue>,
    scalars: BTreeMap<RecordField, String>,
    people: BTreeSet<String>,
    companies: BTreeSet<String>,
    projects: BTreeSet<String>,
    keywords: BTreeSet<String>,
    highlights: Vec<Highlight>,
    source_len: usize,
}

impl Accumulator {
    fn highlight(&mut self, fragment: &ExtractionFragment, text: &str, span: Option<SourceSpan>) {
        let Some(span) = span else { return };
        if span.is_empty() || span.end > self.source_len {
            debug!("Dropping out-of-range span {:?} for '{}'", span, text);
            return;
        }
        self.highlights.push(Highlight {
            class_label: fragment.class_label.trim().to_lowercase(),
            text: text.to_string(),
            span,
        });
    }
}

/// Folds fragments into a [`CanonicalRecord`]
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    honorifics: HonorificTable,
}

impl Reconciler {
    /// Create a reconciler with a custom honorific table
    pub fn new(honorifics: HonorificTable) -> Self {
        Self { honorifics }
    }

    /// Honorific table used for person names
    pub fn honorifics(&self) -> &HonorificTable {
        &self.honorifics
    }

    /// Reconcile the fragments extracted from `source`
    ///
    /// A fragment counts only when it adds an entity, a non-blank scalar or a
    /// non-blank value under a known attribute key. Fails with
    /// `EmptyExtraction` when no fragment counts, and with `SchemaViolation`
    /// when `importance` cannot be parsed.
    pub fn reconcile(
        &self,
        fragments: &[ExtractionFragment],
        source: &str,
    ) -> Result<Reconciliation, ExtractorError> {
        if fragments.is_empty() {
            return Err(ExtractorError::EmptyExtraction(
                "backend returned no fragments".to_string(),
            ));
        }

        let mut acc = Accumulator {
            source_len: source.chars().count(),
            ..Accumulator::default()
        };
        let mut recognized = 0;

        for fragment in fragments {
            let contributed = match FragmentClass::of(&fragment.class_label) {
                FragmentClass::Unknown => {
                    debug!("Ignoring fragment with unknown class '{}'", fragment.class_label);
                    continue;
                }
                FragmentClass::Entity(kind) => self.add_entity(&mut acc, kind, fragment),
                FragmentClass::Scalar(field) => {
                    let value = fragment.matched_text.trim();
                    if !value.is_empty() {
                        acc.scalars.insert(field, value.to_string());
                        acc.highlight(fragment, value, fragment.source_span);
                    }
                    !value.is_empty()
                }
                FragmentClass::Attributes => {
                    let mut filled = false;
                    for (key, value) in &fragment.attributes {
                        match RecordField::parse(key) {
                            Some(field) => {
                                filled |= !value.to_list().is_empty();
                                acc.attributes.insert(field, value.clone());
                            }
                            None => debug!("Ignoring unknown attribute '{}'", key),
                        }
                    }
                    let text = fragment.matched_text.trim();
                    if !text.is_empty() {
                        acc.highlight(fragment, text, fragment.source_span);
                    }
                    filled
                }
            };
            if contributed {
                recognized += 1;
            } else {
                debug!("Fragment '{}' carried no usable content", fragment.class_label);
            }
        }

        if recognized == 0 {
            return Err(ExtractorError::EmptyExtraction(format!(
                "none of the {} fragments carried usable content",
                fragments.len()
            )));
        }

        let mut highlights = std::mem::take(&mut acc.highlights);
        highlights.sort_by(|a, b| {
            (a.span.start, a.span.end, &a.class_label, &a.text)
                .cmp(&(b.span.start, b.span.end, &b.class_label, &b.text))
        });
        highlights.dedup();

        let record = self.build_record(acc)?;

        Ok(Reconciliation {
            record,
            highlights,
            recognized,
        })
    }

    fn add_entity(&self, acc: &mut Accumulator, kind: EntityKind, fragment: &ExtractionFragment) -> bool {
        if kind == EntityKind::Person {
            let normalized = self.honorifics.normalize(&fragment.matched_text);
            if normalized.name.is_empty() {
                return false;
            }
            let span = fragment
                .source_span
                .map(|span| span.shrink_end(normalized.removed_chars));
            acc.highlight(fragment, &normalized.name, span);
            acc.people.insert(normalized.name);
            return true;
        }

        let text = fragment.matched_text.trim();
        if text.is_empty() {
            return false;
        }
        acc.highlight(fragment, text, fragment.source_span);
        let target = match kind {
            EntityKind::Company => &mut acc.companies,
            EntityKind::Project => &mut acc.projects,
            EntityKind::Keyword | EntityKind::Person => &mut acc.keywords,
        };
        target.insert(text.to_string());
        true
    }

    fn build_record(&self, acc: Accumulator) -> Result<CanonicalRecord, SchemaViolation> {
        let Accumulator {
            attributes,
            scalars,
            mut people,
            mut companies,
            mut projects,
            mut keywords,
            ..
        } = acc;

        let text_of = |field: RecordField| {
            attributes
                .get(&field)
                .map(AttributeValue::to_text)
                .filter(|text| !text.is_empty())
        };
        let list_of = |field: RecordField| {
            attributes
                .get(&field)
                .map(AttributeValue::to_list)
                .unwrap_or_default()
        };
        let scalar_of = |field: RecordField| text_of(field).or_else(|| scalars.get(&field).cloned());

        let importance = match text_of(RecordField::Importance) {
            None => Importance::default(),
            Some(raw) => Importance::parse(&raw).ok_or_else(|| SchemaViolation {
                field: RecordField::Importance.as_str().to_string(),
                value: raw.clone(),
                reason: "expected one of 重大, 通常, 低 (CRITICAL, NORMAL, LOW)".to_string(),
            })?,
        };

        let received_at = text_of(RecordField::ReceivedAt).and_then(|raw| {
            let parsed = parse_received_at(&raw);
            if parsed.is_none() {
                warn!("Unrecognized received_at '{}', leaving it unset", raw);
            }
            parsed
        });

        people.extend(
            list_of(RecordField::MentionedPeople)
                .iter()
                .map(|name| self.honorifics.strip(name).to_string()),
        );
        companies.extend(list_of(RecordField::MentionedCompanies));
        projects.extend(list_of(RecordField::MentionedProjects));
        keywords.extend(list_of(RecordField::KeywordsDetected));

        Ok(CanonicalRecord {
            subject: text_of(RecordField::Subject).unwrap_or_else(|| UNKNOWN_SUBJECT.to_string()),
            sender: text_of(RecordField::Sender).unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
            recipients: list_of(RecordField::Recipients).into_iter().collect(),
            received_at,
            importance,
            keywords_detected: keywords,
            summary: text_of(RecordField::Summary).unwrap_or_default(),
            action_required: scalar_of(RecordField::ActionRequired),
            deadline: scalar_of(RecordField::Deadline),
            mentioned_people: people,
            mentioned_companies: companies,
            mentioned_projects: projects,
        })
    }
}
