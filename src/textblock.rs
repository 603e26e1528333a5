use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextBlockType {
    Automatic,
    Manual,
}

/// Half-open byte range `[start_index, end_index)` over a submission's text.
///
/// `text` is the spanned substring and `id` is derived from submission id,
/// range and text, so re-deriving a block from the same inputs yields the
/// same identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub id: String,
    pub start_index: usize,
    pub end_index: usize,
    pub text: String,
    #[serde(rename = "type")]
    pub block_type: TextBlockType,
}

impl TextBlock {
    /// Builds a block over `submission_text`, deriving `text` and `id`.
    /// Caller must have validated the range (see `validate_range`).
    pub fn from_indices(
        submission_id: i64,
        submission_text: &str,
        start_index: usize,
        end_index: usize,
        block_type: TextBlockType,
    ) -> Self {
        let text = submission_text[start_index..end_index].to_string();
        let id = Self::compute_id(submission_id, start_index, end_index, &text);
        TextBlock {
            id,
            start_index,
            end_index,
            text,
            block_type,
        }
    }

    pub fn compute_id(submission_id: i64, start_index: usize, end_index: usize, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{submission_id};{start_index}-{end_index};{text}"));
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Re-derives text and id after a boundary edit.
    pub fn rederive(&mut self, submission_id: i64, submission_text: &str) {
        self.text = submission_text[self.start_index..self.end_index].to_string();
        self.id = Self::compute_id(submission_id, self.start_index, self.end_index, &self.text);
    }

    pub fn validate_range(
        submission_text: &str,
        start_index: usize,
        end_index: usize,
    ) -> Result<(), RangeError> {
        if start_index >= end_index || end_index > submission_text.len() {
            return Err(RangeError {
                start_index,
                end_index,
                text_length: submission_text.len(),
            });
        }
        if !submission_text.is_char_boundary(start_index)
            || !submission_text.is_char_boundary(end_index)
        {
            return Err(RangeError {
                start_index,
                end_index,
                text_length: submission_text.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeError {
    pub start_index: usize,
    pub end_index: usize,
    pub text_length: usize,
}

/// Assessor-entered score and comment attached to a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub credits: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_text: Option<String>,
    #[serde(rename = "type")]
    pub feedback_type: TextBlockType,
}

/// A block paired with its (optional) feedback. A ref without feedback still
/// participates in rendering but carries no grading weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlockRef {
    pub block: TextBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl TextBlockRef {
    pub fn new(block: TextBlock) -> Self {
        TextBlockRef {
            block,
            feedback: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_date: Option<String>,
}

impl Submission {
    /// Accepts only RFC 3339 submitted dates; the UI sends what the server
    /// stored and anything else is a caller bug.
    pub fn validate_submitted_date(&self) -> Result<(), String> {
        let Some(raw) = self.submitted_date.as_deref() else {
            return Ok(());
        };
        match chrono::DateTime::parse_from_rfc3339(raw) {
            Ok(_) => Ok(()),
            Err(e) => Err(format!("submittedDate is not RFC 3339: {e}")),
        }
    }
}
