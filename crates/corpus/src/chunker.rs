//! Boundary-preferring text chunking.
//!
//! Documents are split into overlapping spans around a target size. The cut
//! point prefers, in order: a paragraph break, then a sentence boundary, and
//! finally a hard cut — each searched within a tolerance window around the
//! target. The policy is deliberately tunable; everything lives in
//! [`ChunkPolicy::split`] and its helpers.

use unicode_segmentation::UnicodeSegmentation;

/// Chunking parameters, all in bytes (cuts are snapped to UTF-8 boundaries).
#[derive(Debug, Clone, Copy)]
pub struct ChunkPolicy {
    /// Target chunk size
    pub target: usize,

    /// Overlap stride between consecutive chunks
    pub overlap: usize,

    /// How far from the target a preferred boundary may be
    pub tolerance: usize,
}

impl ChunkPolicy {
    pub fn new(target: usize, overlap: usize, tolerance: usize) -> Self {
        Self {
            target,
            overlap,
            tolerance,
        }
    }

    /// Split `text` into spans.
    ///
    /// Invariants: spans ascend by position, consecutive spans overlap by at
    /// most the stride, and their union covers the whole text. Whitespace-only
    /// input yields no spans. The final chunk absorbs any tail that fits
    /// within `target + tolerance`, so no fragment chunks are produced.
    pub fn split(&self, text: &str) -> Vec<ChunkSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let len = text.len();
        let mut spans = Vec::new();
        let mut start = 0usize;

        loop {
            if len - start <= self.target + self.tolerance {
                spans.push(ChunkSpan::new(text, start, len));
                break;
            }

            let ideal = snap_back(text, start + self.target);
            let lo = snap_forward(
                text,
                (start + self.target)
                    .saturating_sub(self.tolerance)
                    .max(start + 1),
            );
            let hi = snap_back(text, start + self.target + self.tolerance);

            let mut end = pick_cut(text, start, lo, hi, ideal);
            if end <= start {
                // Degenerate window (e.g. pathological multibyte run); force progress.
                end = snap_forward(text, start + self.target).min(len);
            }
            spans.push(ChunkSpan::new(text, start, end));

            if end >= len {
                break;
            }

            let mut next = snap_forward(text, end.saturating_sub(self.overlap));
            if next <= start {
                next = end;
            }
            start = next;
        }

        spans
    }
}

/// One chunk-to-be: a byte span plus its text.
#[derive(Debug, Clone)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl ChunkSpan {
    fn new(source: &str, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            text: source[start..end].to_string(),
        }
    }
}

/// Choose the cut point inside `[lo, hi]`, preferring the paragraph break
/// nearest `ideal`, then the nearest sentence boundary, then `ideal` itself.
fn pick_cut(text: &str, start: usize, lo: usize, hi: usize, ideal: usize) -> usize {
    if lo > hi {
        return ideal;
    }

    if let Some(cut) = nearest_paragraph_break(text, lo, hi, ideal) {
        return cut;
    }

    if let Some(cut) = nearest_sentence_bound(text, start, lo, hi, ideal) {
        return cut;
    }

    ideal
}

/// Nearest position just after a `\n\n` within `[lo, hi]`.
fn nearest_paragraph_break(text: &str, lo: usize, hi: usize, ideal: usize) -> Option<usize> {
    let window_start = snap_back(text, lo.saturating_sub(2));
    let mut best: Option<usize> = None;

    let mut search_from = window_start;
    while let Some(found) = text[search_from..hi].find("\n\n") {
        let cut = search_from + found + 2;
        search_from = search_from + found + 1;
        if cut < lo || cut > hi {
            continue;
        }
        best = closer_to(best, cut, ideal);
    }

    best
}

/// Nearest sentence start within `[lo, hi]`, per Unicode sentence bounds of
/// the text from `start` onwards.
fn nearest_sentence_bound(
    text: &str,
    start: usize,
    lo: usize,
    hi: usize,
    ideal: usize,
) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (offset, _) in text[start..hi].split_sentence_bound_indices() {
        let cut = start + offset;
        if cut <= start || cut < lo || cut > hi {
            continue;
        }
        best = closer_to(best, cut, ideal);
    }

    best
}

fn closer_to(best: Option<usize>, candidate: usize, ideal: usize) -> Option<usize> {
    match best {
        Some(current) if current.abs_diff(ideal) <= candidate.abs_diff(ideal) => Some(current),
        _ => Some(candidate),
    }
}

fn snap_back(text: &str, position: usize) -> usize {
    let mut i = position.min(text.len());
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn snap_forward(text: &str, position: usize) -> usize {
    let len = text.len();
    let mut i = position.min(len);
    while i < len && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
