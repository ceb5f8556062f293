use crate::error::{ConsensusError, Result};
use bio::alignment::{
    Alignment, AlignmentOperation,
    pairwise::{Aligner, Scoring},
};
use serde::{Deserialize, Serialize};

pub const GAP: u8 = b'-';

/// Two gapped rows of equal length and, for each row, the trace index behind
/// every column (`None` where the row has a gap).
#[derive(Clone, Debug, PartialEq)]
pub struct PairwiseAlignment {
    aligned: [Vec<u8>; 2],
    indexed: [Vec<Option<usize>>; 2],
}

impl PairwiseAlignment {
    pub fn new(aligned1: Vec<u8>, aligned2: Vec<u8>) -> Result<Self> {
        if aligned1.len() != aligned2.len() {
            return Err(ConsensusError::Alignment(format!(
                "aligned sequences differ in length ({} vs {})",
                aligned1.len(),
                aligned2.len()
            )));
        }
        let indexed = [Self::index_map(&aligned1), Self::index_map(&aligned2)];
        Ok(Self {
            aligned: [aligned1, aligned2],
            indexed,
        })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.aligned[0].len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.aligned[0].is_empty()
    }

    /// Gapped row 0 or 1.
    #[inline(always)]
    pub fn aligned(&self, row: usize) -> Option<&[u8]> {
        self.aligned.get(row).map(Vec::as_slice)
    }

    #[inline(always)]
    pub fn indexed(&self, row: usize) -> Option<&[Option<usize>]> {
        self.indexed.get(row).map(Vec::as_slice)
    }

    /// Number of non-gap characters in a row.
    pub fn residue_count(&self, row: usize) -> Option<usize> {
        self.aligned(row)
            .map(|aligned| aligned.iter().filter(|&&c| c != GAP).count())
    }

    pub fn into_parts(self) -> ([Vec<u8>; 2], [Vec<Option<usize>>; 2]) {
        (self.aligned, self.indexed)
    }

    /// Maps each column to the number of non-gap characters before it.
    pub fn index_map(aligned: &[u8]) -> Vec<Option<usize>> {
        let mut next = 0;
        aligned
            .iter()
            .map(|&c| {
                if c == GAP {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect()
    }
}

/// Produces a gapped pairwise alignment of two base-call sequences.
pub trait SequenceAligner {
    fn align(&self, seq1: &[u8], seq2: &[u8]) -> Result<PairwiseAlignment>;
}

impl<F> SequenceAligner for F
where
    F: Fn(&[u8], &[u8]) -> Result<PairwiseAlignment>,
{
    fn align(&self, seq1: &[u8], seq2: &[u8]) -> Result<PairwiseAlignment> {
        self(seq1, seq2)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerParameters {
    pub match_score: i32,
    pub mismatch_score: i32,
    /// Score of any pairing that involves an `N`.
    pub ambiguous_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for AlignerParameters {
    fn default() -> Self {
        Self {
            match_score: 1,
            mismatch_score: -1,
            ambiguous_score: 0,
            gap_open: -5,
            gap_extend: -1,
        }
    }
}

/// Which read may keep an unaligned prefix and which an unaligned suffix
/// (`true` for the first read). At most one read hangs over at each end.
const OVERHANG_CHOICES: [(bool, bool); 4] =
    [(true, false), (false, true), (true, true), (false, false)];

/// Overlap alignment of a forward and a reverse read: unaligned ends of
/// either sequence cost nothing and come out as end gaps.
#[derive(Clone, Debug, Default)]
pub struct OverlapAligner {
    parameters: AlignerParameters,
}

impl OverlapAligner {
    pub fn new(parameters: AlignerParameters) -> Self {
        Self { parameters }
    }

    #[inline(always)]
    pub fn parameters(&self) -> &AlignerParameters {
        &self.parameters
    }

    /// Appends `bases` to `row` and as many gaps to `other`.
    fn push_overhang(row: &mut Vec<u8>, other: &mut Vec<u8>, bases: &[u8]) {
        row.extend_from_slice(bases);
        other.extend(std::iter::repeat_n(GAP, bases.len()));
    }

    fn scoring(&self, first_prefix: bool, first_suffix: bool) -> Scoring<impl Fn(u8, u8) -> i32> {
        let p = self.parameters.to_owned();
        let match_fn = move |a: u8, b: u8| {
            if a == b'N' || b == b'N' {
                p.ambiguous_score
            } else if a == b {
                p.match_score
            } else {
                p.mismatch_score
            }
        };
        let scoring = Scoring::new(self.parameters.gap_open, self.parameters.gap_extend, match_fn);
        let scoring = if first_prefix {
            scoring.xclip_prefix(0)
        } else {
            scoring.yclip_prefix(0)
        };
        if first_suffix {
            scoring.xclip_suffix(0)
        } else {
            scoring.yclip_suffix(0)
        }
    }

    fn overlap_with(&self, seq1: &[u8], seq2: &[u8], choice: (bool, bool)) -> Alignment {
        let scoring = self.scoring(choice.0, choice.1);
        let mut aligner = Aligner::with_capacity_and_scoring(seq1.len(), seq2.len(), scoring);
        aligner.custom(seq1, seq2)
    }

    /// Best scoring overlap over all overhang choices. Freeing both prefixes
    /// (or both suffixes) at once would leave them unaligned side by side.
    fn best_overlap(&self, seq1: &[u8], seq2: &[u8]) -> Alignment {
        let mut best = self.overlap_with(seq1, seq2, OVERHANG_CHOICES[0]);
        for &choice in &OVERHANG_CHOICES[1..] {
            let alignment = self.overlap_with(seq1, seq2, choice);
            if alignment.score > best.score {
                best = alignment;
            }
        }
        best
    }
}

impl SequenceAligner for OverlapAligner {
    fn align(&self, seq1: &[u8], seq2: &[u8]) -> Result<PairwiseAlignment> {
        let alignment = self.best_overlap(seq1, seq2);

        let capacity = seq1.len() + seq2.len();
        let mut row1 = Vec::with_capacity(capacity);
        let mut row2 = Vec::with_capacity(capacity);
        let (mut x, mut y) = (alignment.xstart, alignment.ystart);

        // Clipped prefix, then the aligned core, then clipped suffix. At most
        // one read is clipped at each end.
        Self::push_overhang(&mut row1, &mut row2, &seq1[..x]);
        Self::push_overhang(&mut row2, &mut row1, &seq2[..y]);
        for op in &alignment.operations {
            match op {
                AlignmentOperation::Match | AlignmentOperation::Subst => {
                    row1.push(seq1[x]);
                    row2.push(seq2[y]);
                    x += 1;
                    y += 1;
                }
                AlignmentOperation::Del => {
                    row1.push(GAP);
                    row2.push(seq2[y]);
                    y += 1;
                }
                AlignmentOperation::Ins => {
                    row1.push(seq1[x]);
                    row2.push(GAP);
                    x += 1;
                }
                AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => {}
            }
        }
        Self::push_overhang(&mut row1, &mut row2, &seq1[x..]);
        Self::push_overhang(&mut row2, &mut row1, &seq2[y..]);

        log::debug!(
            "Aligned {} and {} bases into {} columns (score {})",
            seq1.len(),
            seq2.len(),
            row1.len(),
            alignment.score
        );
        PairwiseAlignment::new(row1, row2)
    }
}
