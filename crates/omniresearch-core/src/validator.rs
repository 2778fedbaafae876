//! Note deduplication.

use std::collections::HashSet;

use crate::state::ResearchState;

/// Re-scans the full `extracted_notes` history and appends every note text
/// not yet validated, keeping `validated_sources` positionally aligned. The
/// first URL that carried a given text wins; later duplicates are dropped by
/// content, not by URL. Seeding the seen-set from `validated_notes` makes the
/// pass idempotent.
pub fn validate(state: &mut ResearchState) {
    let mut seen: HashSet<String> = state.validated_notes.iter().cloned().collect();

    for (url, note) in &state.extracted_notes {
        if seen.insert(note.clone()) {
            state.validated_notes.push(note.clone());
            state.validated_sources.push(url.clone());
        }
    }

    debug_assert_eq!(state.validated_notes.len(), state.validated_sources.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mode;

    fn state_with_notes(notes: &[(&str, &str)]) -> ResearchState {
        let mut state = ResearchState::new("topic", Mode::Shallow);
        state.extracted_notes = notes
            .iter()
            .map(|(url, text)| (url.to_string(), text.to_string()))
            .collect();
        state
    }

    #[test]
    fn dedups_by_content_first_url_wins() {
        let mut state = state_with_notes(&[
            ("u1", "same text"),
            ("u2", "same text"),
            ("u3", "other"),
        ]);
        validate(&mut state);

        assert_eq!(state.validated_notes, vec!["same text", "other"]);
        assert_eq!(state.validated_sources, vec!["u1", "u3"]);
    }

    #[test]
    fn validation_is_idempotent() {
        let mut state = state_with_notes(&[("u1", "a"), ("u2", "b")]);
        validate(&mut state);
        let notes = state.validated_notes.clone();
        let sources = state.validated_sources.clone();

        validate(&mut state);
        assert_eq!(state.validated_notes, notes);
        assert_eq!(state.validated_sources, sources);
    }

    #[test]
    fn later_batches_only_append_new_content() {
        let mut state = state_with_notes(&[("u1", "a")]);
        validate(&mut state);

        state
            .extracted_notes
            .push(("u4".to_string(), "a".to_string()));
        state
            .extracted_notes
            .push(("u5".to_string(), "fresh".to_string()));
        validate(&mut state);

        assert_eq!(state.validated_notes, vec!["a", "fresh"]);
        assert_eq!(state.validated_sources, vec!["u1", "u5"]);
    }

    #[test]
    fn note_and_source_lists_stay_aligned() {
        let mut state = state_with_notes(&[("u1", "a"), ("u2", "b"), ("u3", "a"), ("u4", "c")]);
        validate(&mut state);
        assert_eq!(state.validated_notes.len(), state.validated_sources.len());
    }
}
