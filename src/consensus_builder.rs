use crate::{
    base_probability::combine_calls,
    consensus_settings::{ConsensusAlgorithm, ConsensusSettings},
    consensus_trim::{self, TRIMMED, TrimOutcome},
    error::{ConsensusError, Result},
    pairwise_alignment::{GAP, OverlapAligner, SequenceAligner},
    sequence_trace::SequenceTrace,
};
use itertools::izip;
use std::{ops::RangeInclusive, rc::Rc};

/// Score recorded when neither trace has usable data at a column.
const NO_DATA_SCORE: f64 = 1.0;

/// Legacy score of a column without a usable call; never clears a threshold.
const LEGACY_NO_CALL_SCORE: f64 = -1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsensusMode {
    Single,
    Bayesian,
    Legacy,
}

impl ConsensusMode {
    pub fn select(num_seqs: usize, algorithm: ConsensusAlgorithm) -> Self {
        match (num_seqs, algorithm) {
            (1, _) => ConsensusMode::Single,
            (_, ConsensusAlgorithm::Bayesian) => ConsensusMode::Bayesian,
            (_, ConsensusAlgorithm::Legacy) => ConsensusMode::Legacy,
        }
    }
}

#[inline(always)]
fn is_usable(base: u8) -> bool {
    base != GAP && base != b'N'
}

/// Builds a consensus sequence from one trace, or from a forward and a
/// reverse trace, and applies automatic end trimming.
///
/// The consensus has one position per alignment column. Positions that fall
/// below the confidence threshold hold `N`; trimmed positions hold a space.
#[derive(Debug)]
pub struct ConsensusBuilder<T: SequenceTrace> {
    traces: Vec<T>,
    settings: Rc<ConsensusSettings>,
    aligned: Vec<Vec<u8>>,
    indexed: Vec<Vec<Option<usize>>>,
    consensus: Vec<u8>,
    confidences: Vec<f64>,
}

impl<T: SequenceTrace> ConsensusBuilder<T> {
    /// Two traces are aligned with an [`OverlapAligner`].
    pub fn new(traces: Vec<T>, settings: Option<Rc<ConsensusSettings>>) -> Result<Self> {
        Self::with_aligner(traces, settings, &OverlapAligner::default())
    }

    pub fn with_aligner(
        traces: Vec<T>,
        settings: Option<Rc<ConsensusSettings>>,
        aligner: &dyn SequenceAligner,
    ) -> Result<Self> {
        let (aligned, indexed) = match traces.as_slice() {
            [trace] => {
                let calls = trace.base_calls().to_vec();
                let identity = (0..calls.len()).map(Some).collect();
                (vec![calls], vec![identity])
            }
            [trace1, trace2] => {
                let alignment = aligner.align(trace1.base_calls(), trace2.base_calls())?;
                for (row, trace) in [trace1, trace2].into_iter().enumerate() {
                    let residues = alignment.residue_count(row).unwrap_or_default();
                    if residues != trace.base_calls().len() {
                        return Err(ConsensusError::Alignment(format!(
                            "aligned row {row} holds {residues} bases but trace {row} has {}",
                            trace.base_calls().len()
                        )));
                    }
                }
                let (aligned, indexed) = alignment.into_parts();
                (Vec::from(aligned), Vec::from(indexed))
            }
            _ => {
                return Err(ConsensusError::Builder(format!(
                    "A consensus needs one or two traces, got {}",
                    traces.len()
                )));
            }
        };
        let mut ret = Self {
            traces,
            settings: settings.unwrap_or_default(),
            aligned,
            indexed,
            consensus: vec![],
            confidences: vec![],
        };
        ret.make_consensus_sequence();
        Ok(ret)
    }

    #[inline(always)]
    pub fn settings(&self) -> &Rc<ConsensusSettings> {
        &self.settings
    }

    #[inline(always)]
    pub fn num_seqs(&self) -> usize {
        self.traces.len()
    }

    #[inline(always)]
    pub fn mode(&self) -> ConsensusMode {
        ConsensusMode::select(self.num_seqs(), self.settings.consensus_algorithm())
    }

    /// Rebuilds the consensus from the traces using the current settings.
    pub fn make_consensus_sequence(&mut self) {
        let min_conf_score = f64::from(self.settings.min_conf_score());
        let (consensus, confidences) = match self.mode() {
            ConsensusMode::Single => self.single_consensus(min_conf_score),
            ConsensusMode::Bayesian => self.bayesian_consensus(min_conf_score),
            ConsensusMode::Legacy => self.legacy_consensus(min_conf_score),
        };
        self.consensus = consensus;
        self.confidences = confidences;
        log::debug!(
            "Built {:?} consensus of {} columns at minimum confidence {}",
            self.mode(),
            self.consensus.len(),
            min_conf_score
        );

        if self.settings.auto_trim() {
            if self.settings.trim_end_gaps() {
                self.trim_end_gaps();
            }
            let (window, base_count) = self.settings.auto_trim_params();
            self.trim_consensus(window, base_count);
        }
    }

    fn single_consensus(&self, min_conf_score: f64) -> (Vec<u8>, Vec<f64>) {
        let trace = &self.traces[0];
        izip!(&self.aligned[0], &self.indexed[0])
            .map(|(&base, index)| {
                let score = index.map_or(0.0, |i| f64::from(trace.base_call_conf(i)));
                let base = if score < min_conf_score { b'N' } else { base };
                (base, score)
            })
            .unzip()
    }

    /// Usable call of one trace at a column, as (base, score).
    fn usable_call(&self, seq: usize, column: usize) -> Option<(u8, f64)> {
        let base = self.aligned[seq][column];
        if !is_usable(base) {
            return None;
        }
        let index = self.indexed[seq][column]?;
        Some((base, f64::from(self.traces[seq].base_call_conf(index))))
    }

    fn bayesian_consensus(&self, min_conf_score: f64) -> (Vec<u8>, Vec<f64>) {
        (0..self.aligned[0].len())
            .map(|column| {
                let (base, score) =
                    match (self.usable_call(0, column), self.usable_call(1, column)) {
                        (Some((base1, score1)), Some((base2, score2))) => {
                            combine_calls(base1, score1, base2, score2).unwrap_or_else(|| {
                                log::debug!(
                                    "Column {column}: no probability model for {:?}/{:?}, calling N",
                                    char::from(base1),
                                    char::from(base2)
                                );
                                (b'N', NO_DATA_SCORE)
                            })
                        }
                        (Some(call), None) | (None, Some(call)) => call,
                        (None, None) => (b'N', NO_DATA_SCORE),
                    };
                if score >= min_conf_score {
                    (base, score)
                } else {
                    (b'N', score)
                }
            })
            .unzip()
    }

    fn legacy_consensus(&self, min_conf_score: f64) -> (Vec<u8>, Vec<f64>) {
        (0..self.aligned[0].len())
            .map(|column| {
                let call1 = self.usable_call(0, column);
                let call2 = self.usable_call(1, column);
                let score1 = call1.map_or(LEGACY_NO_CALL_SCORE, |(_, s)| s);
                let score2 = call2.map_or(LEGACY_NO_CALL_SCORE, |(_, s)| s);
                let clears = |call: Option<(u8, f64)>| {
                    call.filter(|(_, score)| *score >= min_conf_score)
                        .map(|(base, _)| base)
                };
                let base = match (clears(call1), clears(call2)) {
                    (Some(base1), Some(base2)) if base1 != base2 => b'N',
                    (Some(base), _) | (None, Some(base)) => base,
                    (None, None) => b'N',
                };
                (base, score1.max(score2))
            })
            .unzip()
    }

    /// Left end of the overlap between the two aligned traces.
    pub fn left_end_gap_start(&self) -> Option<usize> {
        match self.aligned.as_slice() {
            [aligned1, aligned2] => consensus_trim::left_end_gap_start(aligned1, aligned2),
            _ => None,
        }
    }

    /// Right end of the overlap between the two aligned traces.
    pub fn right_end_gap_start(&self) -> Option<usize> {
        match self.aligned.as_slice() {
            [aligned1, aligned2] => consensus_trim::right_end_gap_start(aligned1, aligned2),
            _ => None,
        }
    }

    /// Blanks the consensus outside the overlap of both traces. Does nothing
    /// for a single trace.
    pub fn trim_end_gaps(&mut self) {
        if let [aligned1, aligned2] = self.aligned.as_slice() {
            consensus_trim::trim_end_gaps(&mut self.consensus, aligned1, aligned2);
        }
    }

    pub fn trim_consensus(&mut self, window: usize, min_good: usize) -> TrimOutcome {
        let outcome = consensus_trim::quality_trim(&mut self.consensus, window, min_good);
        match outcome {
            TrimOutcome::Blanked => log::warn!(
                "No window of {window} positions holds {min_good} good bases; the whole consensus was trimmed"
            ),
            _ => log::debug!("Quality trim ({window}, {min_good}): {outcome:?}"),
        }
        outcome
    }

    #[inline(always)]
    pub fn consensus(&self) -> &[u8] {
        &self.consensus
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.consensus.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.consensus.is_empty()
    }

    /// The consensus between `start` and `end`, both inclusive.
    pub fn consensus_range(&self, start: usize, end: usize) -> Result<&[u8]> {
        let range = self.checked_range(start, end)?;
        Ok(&self.consensus[range])
    }

    pub fn consensus_string(&self) -> String {
        String::from_utf8_lossy(&self.consensus).to_string()
    }

    /// The consensus without trimmed positions.
    pub fn compact_consensus(&self) -> Vec<u8> {
        self.consensus
            .iter()
            .copied()
            .filter(|&base| base != TRIMMED)
            .collect()
    }

    #[inline(always)]
    pub fn confidences(&self) -> &[f64] {
        &self.confidences
    }

    /// Replaces the whole consensus, e.g. with a previously saved edit.
    pub fn set_consensus_sequence(&mut self, consensus: Vec<u8>) -> Result<()> {
        if consensus.len() != self.consensus.len() {
            return Err(ConsensusError::Builder(format!(
                "The length of the supplied consensus sequence ({}) is invalid, expected {}",
                consensus.len(),
                self.consensus.len()
            )));
        }
        self.consensus = consensus;
        Ok(())
    }

    pub fn aligned_sequence(&self, seq_num: usize) -> Result<&[u8]> {
        self.check_seq_num(seq_num)?;
        Ok(&self.aligned[seq_num])
    }

    pub fn sequence_trace(&self, seq_num: usize) -> Result<&T> {
        self.check_seq_num(seq_num)?;
        Ok(&self.traces[seq_num])
    }

    /// Index into trace `seq_num` behind an alignment column; None at gaps or
    /// beyond the alignment.
    pub fn actual_seq_index(&self, seq_num: usize, column: usize) -> Result<Option<usize>> {
        self.check_seq_num(seq_num)?;
        Ok(self.indexed[seq_num].get(column).copied().flatten())
    }

    pub(crate) fn checked_range(&self, start: usize, end: usize) -> Result<RangeInclusive<usize>> {
        if start > end || end >= self.consensus.len() {
            return Err(ConsensusError::IndexOutOfRange {
                start,
                end,
                len: self.consensus.len(),
            });
        }
        Ok(start..=end)
    }

    /// Overwrites the consensus from `start` on with `data`, returning what
    /// was there before.
    pub(crate) fn replace_range(&mut self, start: usize, data: &[u8]) -> Vec<u8> {
        let target = &mut self.consensus[start..start + data.len()];
        let prior = target.to_vec();
        target.copy_from_slice(data);
        prior
    }

    fn check_seq_num(&self, seq_num: usize) -> Result<()> {
        if seq_num >= self.num_seqs() {
            return Err(ConsensusError::Builder(format!(
                "Invalid sequence number {seq_num}, the consensus has {} sequence(s)",
                self.num_seqs()
            )));
        }
        Ok(())
    }
}
