//! Incremental rewrite rules applied right after an event is appended to an
//! open transaction. Each rule only looks at the newly appended tail.

use super::Event;
use super::EventKind;
use super::OldValue;

/// Folds an earlier `changed` event for the same cell into the one just
/// appended: the earlier event is removed and the new event carries every
/// old value, oldest first.
///
/// The whole list is searched, so a merge may cross interleaved events of
/// other cells.
pub(crate) fn merge_changed(events: &mut Vec<Event>) {
    let Some(last) = events.last() else {
        return;
    };
    if !matches!(last.kind, EventKind::Changed { .. }) {
        return;
    }

    let subject = last.subject.clone();
    let tail = events.len() - 1;
    let Some(earlier) = events[..tail]
        .iter()
        .position(|e| matches!(e.kind, EventKind::Changed { .. }) && e.subject.same_cell(&subject))
    else {
        return;
    };

    let earlier = events.remove(earlier);
    let EventKind::Changed { old: earlier_old, .. } = earlier.kind else {
        return;
    };

    if let Some(Event {
        kind: EventKind::Changed { old, .. },
        ..
    }) = events.last_mut()
    {
        let current = std::mem::replace(old, OldValue::Merged(Vec::new()));
        let mut merged = earlier_old.into_vec();
        merged.extend(current.into_vec());
        *old = OldValue::Merged(merged);
    }
}

/// Swaps a freshly appended `aborted` event in front of the `pending` event
/// of the same cell that immediately precedes it, so the log reads
/// "aborted, then new value pending".
pub(crate) fn reorder_abort(events: &mut [Event]) {
    let len = events.len();
    if len < 2 {
        return;
    }

    let (previous, last) = (&events[len - 2], &events[len - 1]);
    if matches!(last.kind, EventKind::AsyncAborted { .. })
        && matches!(previous.kind, EventKind::AsyncPending { .. })
        && previous.subject.same_cell(&last.subject)
    {
        events.swap(len - 2, len - 1);
    }
}
