use serde::Serialize;

use crate::textblock::{RangeError, Submission, TextBlock, TextBlockRef, TextBlockType};

/// Result of reconciling a submission's block set: an ordered, gap-free,
/// non-overlapping partition of the full text, plus the refs that overlap
/// resolution pushed out (kept so the UI can offer to restore them).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub partition: Vec<TextBlockRef>,
    pub displaced: Vec<TextBlockRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReconcileError {
    /// An input block's range does not fit the submission text. Caller error.
    #[serde(rename_all = "camelCase")]
    InvalidRange {
        block_id: String,
        #[serde(flatten)]
        range: RangeError,
    },
    /// Two blocks of the same type overlap; no winner can be chosen by type,
    /// so the caller has to resolve this by editing.
    #[serde(rename_all = "camelCase")]
    SameTypeOverlap {
        block_type: TextBlockType,
        first_block_id: String,
        second_block_id: String,
    },
    /// Bookkeeping invariant broke mid-walk. Indicates corrupted input
    /// ordering upstream, not an authoring mistake.
    #[serde(rename_all = "camelCase")]
    Inconsistent {
        previous_index: usize,
        next_index: usize,
    },
}

impl ReconcileError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::InvalidRange { .. } => "invalid_range",
            ReconcileError::SameTypeOverlap { .. } => "overlap_conflict",
            ReconcileError::Inconsistent { .. } => "inconsistent_state",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReconcileError::InvalidRange { block_id, range } => format!(
                "block {} has range {}..{} outside text of length {}",
                block_id, range.start_index, range.end_index, range.text_length
            ),
            ReconcileError::SameTypeOverlap { block_type, .. } => {
                let kind = match block_type {
                    TextBlockType::Automatic => "AUTOMATIC",
                    TextBlockType::Manual => "MANUAL",
                };
                format!("overlapping {kind} blocks cannot be auto-resolved; edit them manually")
            }
            ReconcileError::Inconsistent {
                previous_index,
                next_index,
            } => format!(
                "partition walk went backwards ({previous_index} > {next_index}); input ordering is corrupt"
            ),
        }
    }
}

/// Merges a possibly-overlapping, possibly-incomplete set of block refs into
/// an ordered partition covering `[0, submission.text.len())` exactly.
///
/// Blocks are processed ascending by start index; blocks sharing a start
/// index keep their input order (stable sort). Gaps between blocks are
/// closed with synthetic feedback-less MANUAL fillers. When an AUTOMATIC and
/// a MANUAL block overlap, the MANUAL one wins and the AUTOMATIC one moves
/// to the displaced set; text the loser covered alone is re-covered by a
/// filler. Same-type overlaps are not resolvable and fail the whole call.
///
/// Pure: no state survives between calls.
pub fn reconcile(
    submission: &Submission,
    refs: Vec<TextBlockRef>,
) -> Result<Reconciliation, ReconcileError> {
    let text = &submission.text;
    for r in &refs {
        TextBlock::validate_range(text, r.block.start_index, r.block.end_index).map_err(
            |range| ReconcileError::InvalidRange {
                block_id: r.block.id.clone(),
                range,
            },
        )?;
    }

    let mut sorted = refs;
    sorted.sort_by_key(|r| r.block.start_index);

    let mut partition: Vec<TextBlockRef> = Vec::with_capacity(sorted.len() + 1);
    let mut displaced: Vec<TextBlockRef> = Vec::new();
    let last_index = text.len();
    let mut previous_index = 0usize;

    let mut iter = sorted.into_iter();
    loop {
        let current = iter.next();
        let next_index = current
            .as_ref()
            .map(|r| r.block.start_index)
            .unwrap_or(last_index);

        if previous_index > next_index {
            let Some(mut current) = current else {
                // Final sentinel step: previous end past the text length.
                return Err(ReconcileError::Inconsistent {
                    previous_index,
                    next_index,
                });
            };
            let Some(previous) = partition.pop() else {
                // A block starts before 0? Only reachable with corrupt input.
                return Err(ReconcileError::Inconsistent {
                    previous_index,
                    next_index,
                });
            };

            if previous.block.block_type == current.block.block_type {
                return Err(ReconcileError::SameTypeOverlap {
                    block_type: previous.block.block_type,
                    first_block_id: previous.block.id,
                    second_block_id: current.block.id,
                });
            }

            if previous.block.block_type == TextBlockType::Manual {
                // Previous (manual) stays; the incoming automatic block is
                // parked for possible restoration.
                displaced.push(current);
                current = previous;
            } else {
                // Incoming manual block wins. The text the displaced
                // automatic block covered up to here still needs coverage.
                let previous_start = previous.block.start_index;
                displaced.push(previous);
                push_filler(&mut partition, submission, previous_start, next_index);
            }

            previous_index = current.block.end_index;
            partition.push(current);
            continue;
        }

        if previous_index < next_index {
            // Gap between blocks (usually whitespace or a linebreak).
            push_filler(&mut partition, submission, previous_index, next_index);
            previous_index = next_index;
        }

        match current {
            Some(r) => {
                previous_index = r.block.end_index;
                partition.push(r);
            }
            None => break,
        }
    }

    Ok(Reconciliation {
        partition,
        displaced,
    })
}

/// Appends a synthetic feedback-less block spanning `[start, end)`.
/// Zero-width or inverted ranges are skipped, not errors.
fn push_filler(partition: &mut Vec<TextBlockRef>, submission: &Submission, start: usize, end: usize) {
    if start >= end {
        return;
    }
    let block = TextBlock::from_indices(
        submission.id,
        &submission.text,
        start,
        end,
        TextBlockType::Manual,
    );
    partition.push(TextBlockRef::new(block));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textblock::Feedback;

    fn submission(text: &str) -> Submission {
        Submission {
            id: 42,
            text: text.to_string(),
            submitted_date: None,
        }
    }

    fn block(sub: &Submission, start: usize, end: usize, t: TextBlockType) -> TextBlockRef {
        TextBlockRef::new(TextBlock::from_indices(sub.id, &sub.text, start, end, t))
    }

    fn with_feedback(mut r: TextBlockRef, credits: f64) -> TextBlockRef {
        r.feedback = Some(Feedback {
            credits,
            detail_text: None,
            feedback_type: r.block.block_type,
        });
        r
    }

    fn assert_covers(partition: &[TextBlockRef], text_len: usize) {
        let mut cursor = 0usize;
        for r in partition {
            assert_eq!(r.block.start_index, cursor, "partition has a gap or overlap");
            assert!(r.block.start_index < r.block.end_index);
            cursor = r.block.end_index;
        }
        assert_eq!(cursor, text_len, "partition does not reach end of text");
    }

    #[test]
    fn empty_text_and_no_blocks_yields_empty_partition() {
        let sub = submission("");
        let out = reconcile(&sub, vec![]).expect("reconcile");
        assert!(out.partition.is_empty());
        assert!(out.displaced.is_empty());
    }

    #[test]
    fn no_blocks_yields_single_filler() {
        let sub = submission("some submission text");
        let out = reconcile(&sub, vec![]).expect("reconcile");
        assert_eq!(out.partition.len(), 1);
        assert_eq!(out.partition[0].block.start_index, 0);
        assert_eq!(out.partition[0].block.end_index, sub.text.len());
        assert_eq!(out.partition[0].block.text, sub.text);
        assert!(out.partition[0].feedback.is_none());
    }

    #[test]
    fn gaps_are_filled_around_a_single_block() {
        let sub = submission("0123456789");
        let out = reconcile(&sub, vec![block(&sub, 3, 7, TextBlockType::Automatic)])
            .expect("reconcile");
        assert_covers(&out.partition, 10);
        assert_eq!(out.partition.len(), 3);
        assert_eq!(out.partition[0].block.text, "012");
        assert_eq!(out.partition[1].block.text, "3456");
        assert_eq!(out.partition[2].block.text, "789");
        assert!(out.displaced.is_empty());
    }

    #[test]
    fn unsorted_input_comes_back_ordered() {
        let sub = submission("abcdefghij");
        let refs = vec![
            block(&sub, 6, 9, TextBlockType::Automatic),
            block(&sub, 0, 3, TextBlockType::Automatic),
            block(&sub, 3, 6, TextBlockType::Automatic),
        ];
        let out = reconcile(&sub, refs).expect("reconcile");
        assert_covers(&out.partition, 10);
        let starts: Vec<usize> = out.partition.iter().map(|r| r.block.start_index).collect();
        assert_eq!(starts, vec![0, 3, 6, 9]);
    }

    #[test]
    fn manual_wins_when_it_comes_second() {
        // AUTOMATIC [0,10) vs MANUAL [5,15) over 15 chars: manual is kept,
        // automatic is displaced, a filler re-covers [0,5).
        let sub = submission("012345678901234");
        let auto = block(&sub, 0, 10, TextBlockType::Automatic);
        let auto_id = auto.block.id.clone();
        let manual = with_feedback(block(&sub, 5, 15, TextBlockType::Manual), 2.0);
        let out = reconcile(&sub, vec![auto, manual]).expect("reconcile");

        assert_covers(&out.partition, 15);
        assert_eq!(out.partition.len(), 2);
        assert_eq!(out.partition[0].block.text, "01234");
        assert!(out.partition[0].feedback.is_none());
        assert_eq!(out.partition[1].block.start_index, 5);
        assert_eq!(out.partition[1].block.block_type, TextBlockType::Manual);
        assert_eq!(out.displaced.len(), 1);
        assert_eq!(out.displaced[0].block.id, auto_id);
    }

    #[test]
    fn manual_wins_when_it_comes_first() {
        // MANUAL [0,10) vs AUTOMATIC [5,15): manual kept, automatic parked,
        // filler covers the tail the automatic block no longer reaches.
        let sub = submission("012345678901234");
        let manual = block(&sub, 0, 10, TextBlockType::Manual);
        let auto = block(&sub, 5, 15, TextBlockType::Automatic);
        let auto_id = auto.block.id.clone();
        let out = reconcile(&sub, vec![manual, auto]).expect("reconcile");

        assert_covers(&out.partition, 15);
        assert_eq!(out.partition.len(), 2);
        assert_eq!(out.partition[0].block.block_type, TextBlockType::Manual);
        assert_eq!(out.partition[0].block.end_index, 10);
        assert_eq!(out.partition[1].block.text, "01234");
        assert_eq!(out.displaced.len(), 1);
        assert_eq!(out.displaced[0].block.id, auto_id);
    }

    #[test]
    fn same_type_overlap_is_a_conflict() {
        let sub = submission("0123456789");
        let a = block(&sub, 0, 6, TextBlockType::Automatic);
        let b = block(&sub, 4, 9, TextBlockType::Automatic);
        let err = reconcile(&sub, vec![a, b]).unwrap_err();
        assert_eq!(err.code(), "overlap_conflict");
        match err {
            ReconcileError::SameTypeOverlap { block_type, .. } => {
                assert_eq!(block_type, TextBlockType::Automatic)
            }
            other => panic!("expected SameTypeOverlap, got {other:?}"),
        }

        let m1 = block(&sub, 0, 6, TextBlockType::Manual);
        let m2 = block(&sub, 4, 9, TextBlockType::Manual);
        let err = reconcile(&sub, vec![m1, m2]).unwrap_err();
        assert_eq!(err.code(), "overlap_conflict");
    }

    #[test]
    fn invalid_range_is_rejected_up_front() {
        let sub = submission("short");
        let mut bad = block(&sub, 0, 5, TextBlockType::Manual);
        bad.block.end_index = 12;
        let err = reconcile(&sub, vec![bad]).unwrap_err();
        assert_eq!(err.code(), "invalid_range");
    }

    #[test]
    fn reconciling_its_own_output_is_idempotent() {
        let sub = submission("The quick brown fox jumps over the lazy dog");
        let refs = vec![
            with_feedback(block(&sub, 4, 9, TextBlockType::Automatic), 1.0),
            with_feedback(block(&sub, 16, 19, TextBlockType::Manual), -0.5),
        ];
        let first = reconcile(&sub, refs).expect("first pass");
        assert_covers(&first.partition, sub.text.len());

        let second = reconcile(&sub, first.partition.clone()).expect("second pass");
        assert_eq!(first.partition, second.partition);
        assert!(second.displaced.is_empty());
    }

    #[test]
    fn touching_blocks_need_no_filler() {
        let sub = submission("abcdef");
        let refs = vec![
            block(&sub, 0, 3, TextBlockType::Automatic),
            block(&sub, 3, 6, TextBlockType::Automatic),
        ];
        let out = reconcile(&sub, refs).expect("reconcile");
        assert_eq!(out.partition.len(), 2);
        assert_covers(&out.partition, 6);
    }

    #[test]
    fn equal_start_ties_keep_input_order_until_conflicting() {
        // Two blocks starting at 0 always overlap, so the only observable
        // tie-break effect is which one the conflict reports first.
        let sub = submission("0123456789");
        let first = block(&sub, 0, 4, TextBlockType::Manual);
        let second = block(&sub, 0, 8, TextBlockType::Manual);
        let first_id = first.block.id.clone();
        let err = reconcile(&sub, vec![first, second]).unwrap_err();
        match err {
            ReconcileError::SameTypeOverlap { first_block_id, .. } => {
                assert_eq!(first_block_id, first_id)
            }
            other => panic!("expected SameTypeOverlap, got {other:?}"),
        }
    }
}
