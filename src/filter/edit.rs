//! The edit list (C8) and the flush-apply algorithm (spec §4.8), the
//! component the spec calls "the heart of the system".

use bytes::Bytes;

/// A deferred in-stream byte-range replacement.
#[derive(Debug, Clone)]
pub struct Edit {
    /// Absolute stream offset at which the replacement begins.
    pub start: u64,
    /// Number of source bytes this edit deletes starting at `start`.
    pub delete: u64,
    /// Bytes written in place of the deleted range.
    pub replacement: Bytes,
}

impl Edit {
    /// Build an edit from its three fields.
    #[must_use]
    pub fn new(start: u64, delete: u64, replacement: impl Into<Bytes>) -> Self {
        Self {
            start,
            delete,
            replacement: replacement.into(),
        }
    }
}

/// How a [`EditList::apply`] call resolved: either it fully applied every
/// edit it could within the requested horizon, or it had to stop early
/// because an edit straddled the emit horizon on a non-final flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Every edit up to the (possibly clipped) horizon was applied.
    Complete,
    /// An edit extends past the emit horizon on a non-final flush; the
    /// caller should retry with more data or `last: true`.
    Again,
}

/// The result of one [`EditList::apply`] call.
#[derive(Debug)]
pub struct ApplyResult {
    /// Output segments to write downstream, in stream order. Verbatim
    /// segments are zero-copy slices of the input buffer; replacement
    /// segments are the edit's own bytes.
    pub emitted: Vec<Bytes>,
    /// How many source bytes were consumed from the input buffer this
    /// call (verbatim-copied or deleted; both consume from the reader).
    pub consumed: u64,
    /// The new value of `bytes_done` after this call.
    pub bytes_done: u64,
    /// `Σ(len(replacement) − delete)` contributed by edits applied in
    /// this call; add to the running `offs`.
    pub offs_delta: i64,
    /// Whether this call completed or must be retried.
    pub outcome: FlushOutcome,
    /// Human-readable reasons for each edit dropped this call (overlap
    /// with already-emitted bytes, or undeliverable on the final flush).
    /// Logged once per flush; never aborts the transaction.
    pub invalid_edits: Vec<String>,
}

/// Ordered collection of pending edits with sort-and-apply discipline.
#[derive(Debug, Default)]
pub struct EditList {
    edits: Vec<Edit>,
}

impl EditList {
    /// Build an empty edit list.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append an edit. Edits may be appended in any order; [`Self::apply`]
    /// sorts by `start` before applying.
    pub fn push(&mut self, edit: Edit) { self.edits.push(edit); }

    /// Number of edits still pending.
    #[must_use]
    pub fn len(&self) -> usize { self.edits.len() }

    /// Whether there are no pending edits.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.edits.is_empty() }

    /// Discard every pending edit without applying it (spec §4.6 `on_error`:
    /// stop and discard rather than flush).
    pub fn clear(&mut self) { self.edits.clear(); }

    /// Apply as many pending edits as possible to the window
    /// `[bytes_done, bytes_done + nbytes)` of `available` (the bytes
    /// currently resident in the input buffer reader, with `available[0]`
    /// corresponding to stream offset `bytes_done`).
    ///
    /// Edits are sorted ascending by `start`, with ties broken by
    /// insertion order (a stable sort preserves that, since edits are only
    /// ever appended). An edit whose `start == bytes_done + nbytes` is
    /// treated as in-range (spec §9 open question resolution).
    #[must_use]
    pub fn apply(&mut self, bytes_done: u64, available: &Bytes, nbytes: u64, last: bool) -> ApplyResult {
        let mut edits = std::mem::take(&mut self.edits);
        edits.sort_by_key(|e| e.start);

        let mut emitted = Vec::new();
        let mut invalid_edits = Vec::new();
        let mut cursor = bytes_done;
        let mut horizon = bytes_done + nbytes;
        let mut offs_delta: i64 = 0;
        let mut outcome = FlushOutcome::Complete;
        let mut remaining = Vec::new();

        let mut iter = edits.into_iter();
        for edit in iter.by_ref() {
            if edit.start < cursor {
                invalid_edits.push(format!(
                    "edit at {} deleting {} bytes overlaps already-emitted or already-applied bytes (cursor={cursor})",
                    edit.start, edit.delete
                ));
                continue;
            }
            if edit.start + edit.delete > horizon {
                if last {
                    invalid_edits.push(format!(
                        "edit at {} deleting {} bytes exceeds the final flush horizon ({horizon})",
                        edit.start, edit.delete
                    ));
                    continue;
                }
                horizon = edit.start;
                outcome = FlushOutcome::Again;
                remaining.push(edit);
                break;
            }

            if edit.start > cursor {
                let local_start = usize_offset(cursor, bytes_done);
                let local_end = usize_offset(edit.start, bytes_done);
                emitted.push(available.slice(local_start..local_end));
            }
            offs_delta += i64::try_from(edit.replacement.len()).unwrap_or(i64::MAX)
                - i64::try_from(edit.delete).unwrap_or(i64::MAX);
            emitted.push(edit.replacement.clone());
            cursor = edit.start + edit.delete;
        }
        remaining.extend(iter);

        if cursor < horizon {
            let local_start = usize_offset(cursor, bytes_done);
            let local_end = usize_offset(horizon, bytes_done);
            emitted.push(available.slice(local_start..local_end));
        }

        self.edits = remaining;

        ApplyResult {
            emitted,
            consumed: horizon - bytes_done,
            bytes_done: horizon,
            offs_delta,
            outcome,
            invalid_edits,
        }
    }
}

fn usize_offset(absolute: u64, base: u64) -> usize {
    usize::try_from(absolute - base).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn bytes(s: &str) -> Bytes { Bytes::copy_from_slice(s.as_bytes()) }

    #[test]
    fn no_edits_copies_through_verbatim() {
        let mut list = EditList::new();
        let input = bytes("HelloWorld");
        let result = list.apply(0, &input, 10, true);
        assert_eq!(result.outcome, FlushOutcome::Complete);
        let out: Vec<u8> = result.emitted.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(out, b"HelloWorld");
        assert_eq!(result.bytes_done, 10);
        assert_eq!(result.offs_delta, 0);
    }

    #[test]
    fn single_edit_applies_in_full_flush() {
        // S2: "HelloWorld", edit {start:5, delete:5, replacement:"There"}.
        let mut list = EditList::new();
        list.push(Edit::new(5, 5, bytes("There")));
        let input = bytes("HelloWorld");
        let result = list.apply(0, &input, 10, true);
        let out: Vec<u8> = result.emitted.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(out, b"HelloThere");
        assert_eq!(result.offs_delta, 0);
        assert_eq!(result.outcome, FlushOutcome::Complete);
    }

    #[test]
    fn edit_straddling_horizon_defers_with_again() {
        // S3: "Hello" then "World" streamed, edit {start:3, delete:4, replacement:"p!"}.
        let mut list = EditList::new();
        list.push(Edit::new(3, 4, bytes("p!")));
        let first_chunk = bytes("Hello");
        let first = list.apply(0, &first_chunk, 5, false);
        assert_eq!(first.outcome, FlushOutcome::Again);
        // Only bytes [0, 3) are clear of the straddling edit.
        let out: Vec<u8> = first.emitted.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(out, b"Hel");
        assert_eq!(first.bytes_done, 3);
        assert_eq!(list.len(), 1);

        let full = bytes("HelloWorld");
        let window = full.slice(3..10);
        let second = list.apply(3, &window, 7, true);
        let out: Vec<u8> = second.emitted.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(out, b"p!rld");
        assert_eq!(second.offs_delta, -2);
        assert_eq!(second.outcome, FlushOutcome::Complete);
    }

    #[test]
    fn overlapping_edit_is_dropped_as_invalid() {
        // S4: edits {0,3,"x"} and {1,2,"y"} overlap; the later-starting one is rejected.
        let mut list = EditList::new();
        list.push(Edit::new(0, 3, bytes("x")));
        list.push(Edit::new(1, 2, bytes("y")));
        let input = bytes("Hello");
        let first = list.apply(0, &input, 5, true);
        assert_eq!(first.invalid_edits.len(), 1);
        let out: Vec<u8> = first.emitted.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(out, b"xlo");
    }

    #[rstest]
    #[case(10, true)]
    #[case(10, false)]
    fn boundary_edit_is_in_range(#[case] nbytes: u64, #[case] last: bool) {
        let mut list = EditList::new();
        list.push(Edit::new(10, 0, bytes("X")));
        let input = bytes("HelloWorld");
        let result = list.apply(0, &input, nbytes, last);
        assert_eq!(result.invalid_edits.len(), 0);
        let out: Vec<u8> = result.emitted.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(out, b"HelloWorldX");
    }

    #[test]
    fn edit_overlapping_already_emitted_bytes_is_invalid() {
        let mut list = EditList::new();
        list.push(Edit::new(2, 1, bytes("z")));
        let input = bytes("World");
        let result = list.apply(5, &input, 5, true);
        assert_eq!(result.invalid_edits.len(), 1);
        let out: Vec<u8> = result.emitted.iter().flat_map(|b| b.to_vec()).collect();
        assert_eq!(out, b"World");
    }
}
