//! LLM prompt engineering for email extraction

use crate::client::GenerationRequest;
use crate::config::ResponseMode;
use crate::error::ExtractorError;
use crate::exemplars::{Exemplar, ExemplarSet};
use crate::reconcile::Reconciler;
use mailsift_domain::{CanonicalRecord, ExtractionFragment};
use serde_json::{json, Map, Value};

/// Builds the generation request for one document
///
/// The document is embedded verbatim; nothing is truncated or rewritten.
pub struct PromptBuilder<'a> {
    document: &'a str,
    exemplars: &'a ExemplarSet,
    instructions: &'a str,
    mode: ResponseMode,
    reconciler: Option<&'a Reconciler>,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder with the built-in instructions
    pub fn new(document: &'a str, exemplars: &'a ExemplarSet) -> Self {
        Self {
            document,
            exemplars,
            instructions: EXTRACTION_INSTRUCTIONS,
            mode: ResponseMode::default(),
            reconciler: None,
        }
    }

    /// Replace the instruction block
    pub fn with_instructions(mut self, instructions: &'a str) -> Self {
        self.instructions = instructions;
        self
    }

    /// Select the response shape
    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reconcile record-mode exemplars with this reconciler instead of the default one
    pub fn with_reconciler(mut self, reconciler: &'a Reconciler) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Build the complete generation request
    pub fn build(&self) -> Result<GenerationRequest, ExtractorError> {
        if self.document.contains('\0') {
            return Err(ExtractorError::Input(
                "Document contains NUL bytes and is not text".to_string(),
            ));
        }

        let mut prompt = String::new();

        // 1. Instructions and output format
        prompt.push_str(self.instructions.trim_end());
        prompt.push_str("\n\n");

        // 2. Worked examples
        if !self.exemplars.is_empty() {
            prompt.push_str("Examples:\n\n");
            for (idx, exemplar) in self.exemplars.iter().enumerate() {
                prompt.push_str(&format!("### Example {}\n", idx + 1));
                prompt.push_str("Input:\n---\n");
                prompt.push_str(exemplar.text.trim_end());
                prompt.push_str("\n---\nOutput:\n");
                prompt.push_str(&self.render_exemplar(exemplar)?);
                prompt.push_str("\n\n");
            }
        }

        // 3. The email to analyze
        prompt.push_str("Email to analyze:\n");
        prompt.push_str("---\n");
        prompt.push_str(self.document);
        prompt.push_str("\n---\n\n");

        // 4. Output format reminder
        prompt.push_str(match self.mode {
            ResponseMode::Record => RECORD_FORMAT_REMINDER,
            ResponseMode::Fragments => FRAGMENTS_FORMAT_REMINDER,
        });

        let schema = match self.mode {
            ResponseMode::Record => Some(CanonicalRecord::response_schema()),
            ResponseMode::Fragments => None,
        };

        Ok(GenerationRequest {
            prompt,
            mode: self.mode,
            schema,
        })
    }

    fn render_exemplar(&self, exemplar: &Exemplar) -> Result<String, ExtractorError> {
        let value = match self.mode {
            ResponseMode::Fragments => json!({
                "extractions": exemplar.fragments.iter().map(fragment_json).collect::<Vec<_>>()
            }),
            ResponseMode::Record => {
                let reconciliation = match self.reconciler {
                    Some(reconciler) => reconciler.reconcile(&exemplar.fragments, &exemplar.text)?,
                    None => Reconciler::default().reconcile(&exemplar.fragments, &exemplar.text)?,
                };
                serde_json::to_value(&reconciliation.record)?
            }
        };
        Ok(serde_json::to_string(&value)?)
    }
}

/// Wire form of a fragment, as the backend is asked to produce it
fn fragment_json(fragment: &ExtractionFragment) -> Value {
    let mut obj = Map::new();
    obj.insert("extraction_class".to_string(), json!(fragment.class_label));
    obj.insert("extraction_text".to_string(), json!(fragment.matched_text));
    if let Some(span) = fragment.source_span {
        obj.insert(
            "char_interval".to_string(),
            json!({ "start_pos": span.start, "end_pos": span.end }),
        );
    }
    obj.insert("attributes".to_string(), json!(fragment.attributes));
    Value::Object(obj)
}

/// Built-in instruction block
pub const EXTRACTION_INSTRUCTIONS: &str = r##"You are an assistant that triages Japanese business email.
Read the email and extract structured information from it.

Fields:
- subject: the subject line (the "# " heading when present)
- sender: the sender's email address (the "From:" line)
- recipients: every recipient address (To and Cc), as a list
- received_at: when the email was received, formatted YYYY-MM-DD HH:MM:SS
- importance: exactly one of 重大, 通常, 低
- keywords_detected: the words that drove the importance decision
- summary: a one or two sentence summary, in Japanese
- action_required: what the recipient has to do, if anything
- deadline: the due date or period for that action, if one is stated
- mentioned_people, mentioned_companies, mentioned_projects: names that appear in the body

Importance rubric:
- 重大: contracts, complaints, urgent requests, or anything explicitly marked important
  (契約, クレーム, 緊急, 至急, 重要)
- 通常: routine business correspondence and ordinary requests
- 低: administrative notices, newsletters, information shared for reference, CC-only mail

Span conventions:
- person, company, project, keyword, deadline and action_item extractions must quote the email
  verbatim; never paraphrase the extraction text
- quote person names as written, honorifics included (田中様, 佐藤さん)
- an action_item is a sentence that asks the recipient to do something; greetings, sign-offs and
  statements of fact are not action items
- character positions count characters, not bytes, starting at 0; the end position is exclusive
- header_info and analysis_result carry their values as attributes and have empty extraction text"##;

const FRAGMENTS_FORMAT_REMINDER: &str = r#"Output format (JSON only, no additional text):
{
  "extractions": [
    {
      "extraction_class": "header_info | analysis_result | person | company | project | keyword | deadline | action_item",
      "extraction_text": "exact text from the email, or empty",
      "char_interval": {"start_pos": 0, "end_pos": 0},
      "attributes": {}
    }
  ]
}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

const RECORD_FORMAT_REMINDER: &str = r#"Output format (one JSON object only, no additional text):
{
  "subject": "...",
  "sender": "...",
  "recipients": ["..."],
  "received_at": "YYYY-MM-DD HH:MM:SS",
  "importance": "重大 | 通常 | 低",
  "keywords_detected": ["..."],
  "summary": "...",
  "action_required": "... or null",
  "deadline": "... or null",
  "mentioned_people": ["..."],
  "mentioned_companies": ["..."],
  "mentioned_projects": ["..."]
}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;
