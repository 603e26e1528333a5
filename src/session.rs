use std::collections::HashSet;

use crate::reconcile::{reconcile, ReconcileError};
use crate::score;
use crate::textblock::{Feedback, Submission, TextBlock, TextBlockRef, TextBlockType};

/// One open assessment: the submission under review plus the current
/// partition and the displaced ("unused") refs. Owns the reconciliation
/// lifecycle the way the front end's view controller does: mutations only
/// mark the session dirty, and `flush` reconciles at most once per batch.
pub struct AssessmentSession {
    pub submission: Submission,
    pub text_block_refs: Vec<TextBlockRef>,
    pub unused_refs: Vec<TextBlockRef>,
    pub max_points: f64,
    pub bonus_points: f64,
    recompute_pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    BlockNotFound(String),
    FeedbackNotFound(String),
    Reconcile(ReconcileError),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::BlockNotFound(_) | SessionError::FeedbackNotFound(_) => "not_found",
            SessionError::Reconcile(e) => e.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            SessionError::BlockNotFound(id) => format!("no block with id {id}"),
            SessionError::FeedbackNotFound(id) => format!("no feedback on block {id}"),
            SessionError::Reconcile(e) => e.message(),
        }
    }
}

impl From<ReconcileError> for SessionError {
    fn from(e: ReconcileError) -> Self {
        SessionError::Reconcile(e)
    }
}

impl AssessmentSession {
    /// Opens a session and runs the initial reconciliation over the blocks
    /// the server handed us.
    pub fn open(
        submission: Submission,
        refs: Vec<TextBlockRef>,
        max_points: f64,
        bonus_points: f64,
    ) -> Result<Self, SessionError> {
        let mut session = AssessmentSession {
            submission,
            text_block_refs: refs,
            unused_refs: Vec::new(),
            max_points,
            bonus_points,
            recompute_pending: true,
        };
        session.flush()?;
        Ok(session)
    }

    /// Adds a manual block over `[start_index, end_index)`, optionally with
    /// feedback attached in the same step. Returns the block id. A
    /// feedback-less manual block is regenerable filler and will not survive
    /// the next recomputation on its own.
    pub fn add_block(
        &mut self,
        start_index: usize,
        end_index: usize,
        feedback: Option<Feedback>,
    ) -> Result<String, SessionError> {
        TextBlock::validate_range(&self.submission.text, start_index, end_index).map_err(
            |range| {
                SessionError::Reconcile(ReconcileError::InvalidRange {
                    block_id: String::new(),
                    range,
                })
            },
        )?;
        let block = TextBlock::from_indices(
            self.submission.id,
            &self.submission.text,
            start_index,
            end_index,
            TextBlockType::Manual,
        );
        let id = block.id.clone();
        if self.find(&id).is_none() {
            self.text_block_refs.push(TextBlockRef { block, feedback });
        } else if let (Some(f), Some(existing)) = (feedback, self.find_mut(&id)) {
            existing.feedback = Some(f);
        }
        self.recompute_pending = true;
        Ok(id)
    }

    /// Moves a block's boundaries. The edit makes it a manual block and
    /// re-derives its text and id; the new id is returned.
    pub fn update_block(
        &mut self,
        block_id: &str,
        start_index: usize,
        end_index: usize,
    ) -> Result<String, SessionError> {
        TextBlock::validate_range(&self.submission.text, start_index, end_index).map_err(
            |range| {
                SessionError::Reconcile(ReconcileError::InvalidRange {
                    block_id: block_id.to_string(),
                    range,
                })
            },
        )?;
        let submission_id = self.submission.id;
        let submission_text = self.submission.text.clone();
        let r = self
            .find_mut(block_id)
            .ok_or_else(|| SessionError::BlockNotFound(block_id.to_string()))?;
        r.block.start_index = start_index;
        r.block.end_index = end_index;
        r.block.block_type = TextBlockType::Manual;
        r.block.rederive(submission_id, &submission_text);
        if let Some(f) = r.feedback.as_mut() {
            f.feedback_type = TextBlockType::Manual;
        }
        let new_id = r.block.id.clone();
        self.recompute_pending = true;
        Ok(new_id)
    }

    /// Removes a block from the partition and the displaced set. A removed
    /// automatic block does not come back; the text it covered becomes
    /// filler on the next recomputation.
    pub fn delete_block(&mut self, block_id: &str) -> Result<(), SessionError> {
        let before = self.text_block_refs.len() + self.unused_refs.len();
        self.text_block_refs.retain(|r| r.block.id != block_id);
        self.unused_refs.retain(|r| r.block.id != block_id);
        if self.text_block_refs.len() + self.unused_refs.len() == before {
            return Err(SessionError::BlockNotFound(block_id.to_string()));
        }
        self.recompute_pending = true;
        Ok(())
    }

    /// Creates or replaces the feedback on a block. An assessor editing an
    /// automatic suggestion turns the feedback manual.
    pub fn upsert_feedback(
        &mut self,
        block_id: &str,
        credits: f64,
        detail_text: Option<String>,
    ) -> Result<(), SessionError> {
        let r = self
            .find_mut(block_id)
            .ok_or_else(|| SessionError::BlockNotFound(block_id.to_string()))?;
        r.feedback = Some(Feedback {
            credits,
            detail_text,
            feedback_type: TextBlockType::Manual,
        });
        self.recompute_pending = true;
        Ok(())
    }

    pub fn delete_feedback(&mut self, block_id: &str) -> Result<(), SessionError> {
        let r = self
            .find_mut(block_id)
            .ok_or_else(|| SessionError::BlockNotFound(block_id.to_string()))?;
        if r.feedback.take().is_none() {
            return Err(SessionError::FeedbackNotFound(block_id.to_string()));
        }
        self.recompute_pending = true;
        Ok(())
    }

    /// Runs the deferred reconciliation if any mutation happened since the
    /// last flush. Recomputes from scratch over the union of partition and
    /// displaced set, keeping only automatic blocks and feedback-bearing
    /// refs (plain manual filler is regenerable). A displaced automatic
    /// block re-enters the partition here once its conflicting manual block
    /// is gone.
    ///
    /// On error the previous partition stays in place and the error goes to
    /// the caller. Returns whether a recomputation actually ran.
    pub fn flush(&mut self) -> Result<bool, SessionError> {
        if !self.recompute_pending {
            return Ok(false);
        }
        self.recompute_pending = false;

        let mut seen: HashSet<String> = HashSet::new();
        let pool: Vec<TextBlockRef> = self
            .text_block_refs
            .iter()
            .chain(self.unused_refs.iter())
            .filter(|r| r.block.block_type == TextBlockType::Automatic || r.feedback.is_some())
            .filter(|r| seen.insert(r.block.id.clone()))
            .cloned()
            .collect();

        let out = reconcile(&self.submission, pool)?;
        self.text_block_refs = out.partition;
        self.unused_refs = out.displaced;
        Ok(true)
    }

    pub fn total_score(&self) -> f64 {
        score::total_score(&self.text_block_refs, self.max_points, self.bonus_points)
    }

    /// The grading view: automatic or feedback-bearing blocks across both
    /// the partition and the displaced set.
    pub fn blocks_with_feedback(&self) -> Vec<&TextBlock> {
        self.text_block_refs
            .iter()
            .chain(self.unused_refs.iter())
            .filter(|r| r.block.block_type == TextBlockType::Automatic || r.feedback.is_some())
            .map(|r| &r.block)
            .collect()
    }

    fn find(&self, block_id: &str) -> Option<&TextBlockRef> {
        self.text_block_refs
            .iter()
            .chain(self.unused_refs.iter())
            .find(|r| r.block.id == block_id)
    }

    fn find_mut(&mut self, block_id: &str) -> Option<&mut TextBlockRef> {
        self.text_block_refs
            .iter_mut()
            .chain(self.unused_refs.iter_mut())
            .find(|r| r.block.id == block_id)
    }
}
