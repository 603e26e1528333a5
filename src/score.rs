use crate::textblock::TextBlockRef;

/// Sums the credits of all feedback-bearing refs, capped to
/// `max_points + bonus_points` and floored at zero. Feedback-less refs
/// (fillers, unassessed automatic blocks) carry no grading weight.
pub fn total_score(refs: &[TextBlockRef], max_points: f64, bonus_points: f64) -> f64 {
    let sum: f64 = refs
        .iter()
        .filter_map(|r| r.feedback.as_ref())
        .map(|f| f.credits)
        .sum();
    let cap = max_points + bonus_points;
    sum.min(cap).max(0.0)
}
