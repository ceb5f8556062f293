use crate::pairwise_alignment::GAP;

/// Marks a consensus position that was trimmed away.
pub const TRIMMED: u8 = b' ';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrimOutcome {
    /// The sequence is shorter than the window; nothing was changed.
    Skipped,
    /// Positions outside `left..=right` were blanked.
    Kept { left: usize, right: usize },
    /// No window held enough good bases; everything was blanked.
    Blanked,
}

#[inline(always)]
pub fn is_good_base(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T')
}

/// Blanks every position before `left` or after `right`. With `left > right`
/// that is every position.
pub fn blank_outside(consensus: &mut [u8], left: usize, right: usize) {
    for (i, base) in consensus.iter_mut().enumerate() {
        if i < left || i > right {
            *base = TRIMMED;
        }
    }
}

pub fn blank_all(consensus: &mut [u8]) {
    consensus.fill(TRIMMED);
}

/// First column after the leading gap run of whichever row starts with a gap.
/// None if that run covers the whole alignment.
pub fn left_end_gap_start(aligned1: &[u8], aligned2: &[u8]) -> Option<usize> {
    let run = match (aligned1.first(), aligned2.first()) {
        (Some(&GAP), _) => leading_gaps(aligned1.iter()),
        (_, Some(&GAP)) => leading_gaps(aligned2.iter()),
        _ => 0,
    };
    (run < aligned1.len()).then_some(run)
}

/// Last column before the trailing gap run of whichever row ends with a gap.
/// None if that run covers the whole alignment.
pub fn right_end_gap_start(aligned1: &[u8], aligned2: &[u8]) -> Option<usize> {
    let run = match (aligned1.last(), aligned2.last()) {
        (Some(&GAP), _) => leading_gaps(aligned1.iter().rev()),
        (_, Some(&GAP)) => leading_gaps(aligned2.iter().rev()),
        _ => 0,
    };
    aligned1.len().checked_sub(run + 1)
}

fn leading_gaps<'a>(row: impl Iterator<Item = &'a u8>) -> usize {
    row.take_while(|&&c| c == GAP).count()
}

/// Blanks the consensus columns that lie in the end gaps of a two-row
/// alignment.
pub fn trim_end_gaps(consensus: &mut [u8], aligned1: &[u8], aligned2: &[u8]) {
    match (
        left_end_gap_start(aligned1, aligned2),
        right_end_gap_start(aligned1, aligned2),
    ) {
        (Some(left), Some(right)) => blank_outside(consensus, left, right),
        _ => blank_all(consensus),
    }
}

/// Trims both ends of the consensus with a sliding window of `window`
/// positions: each end moves inward until its window holds at least
/// `min_good` called bases (A, C, G or T). The length never changes.
pub fn quality_trim(consensus: &mut [u8], window: usize, min_good: usize) -> TrimOutcome {
    let len = consensus.len();
    if window == 0 || len < window {
        return TrimOutcome::Skipped;
    }
    let good: Vec<usize> = consensus
        .iter()
        .map(|&base| usize::from(is_good_base(base)))
        .collect();

    let mut left = 0;
    let mut num_good: usize = good[..window].iter().sum();
    while num_good < min_good && left + window < len {
        num_good += good[left + window];
        num_good -= good[left];
        left += 1;
    }

    // The right window may not slide past the left cutoff.
    let mut right = len - 1;
    num_good = good[len - window..].iter().sum();
    while num_good < min_good && right >= left + window {
        num_good += good[right - window];
        num_good -= good[right];
        right -= 1;
    }

    if num_good < min_good {
        blank_all(consensus);
        TrimOutcome::Blanked
    } else {
        blank_outside(consensus, left, right);
        TrimOutcome::Kept { left, right }
    }
}
