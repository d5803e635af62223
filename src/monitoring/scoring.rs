use crate::db::models::{Event, EventKind};

/// Score for `total` events of which `distractions` were distractions.
///
/// No events means no evidence of distraction, so the score is 100.
/// Otherwise `round((total - distractions) / total * 100)`, rounding half away
/// from zero.
pub fn focus_score_from_counts(total: usize, distractions: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let distractions = distractions.min(total);
    let focused = (total - distractions) as f64;
    (focused / total as f64 * 100.0).round() as u8
}

/// The one focus-score formula, used for both frozen and live scores.
pub fn focus_score(events: &[Event]) -> u8 {
    let distractions = events
        .iter()
        .filter(|event| event.kind == EventKind::Distraction)
        .count();
    focus_score_from_counts(events.len(), distractions)
}

/// Rounded mean of final scores; 0 when there are none.
pub fn average_score<I>(scores: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let (sum, count) = scores
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), score| (sum + u64::from(score), count + 1));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u8
}
