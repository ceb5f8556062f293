use crate::{
    consensus_builder::ConsensusBuilder,
    consensus_settings::ConsensusSettings,
    consensus_trim::TRIMMED,
    error::{ConsensusError, Result},
    observable::EventChannel,
    pairwise_alignment::SequenceAligner,
    sequence_trace::SequenceTrace,
};
use std::rc::Rc;

/// Closed range of consensus positions touched by a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditRange {
    pub start: usize,
    pub end: usize,
}

/// What a range of the consensus held before a change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditRecord {
    pub start: usize,
    pub end: usize,
    pub prior_data: Vec<u8>,
}

/// A consensus sequence that can be edited by hand, with unlimited undo and
/// redo.
///
/// Events:
/// - `consensus_changed` after every change, with the affected range;
/// - `undo_state_changed` / `redo_state_changed` when the respective stack
///   goes from empty to non-empty (`true`) or back (`false`).
#[derive(Debug)]
pub struct EditableConsensus<T: SequenceTrace> {
    builder: ConsensusBuilder<T>,
    undo_stack: Vec<EditRecord>,
    redo_stack: Vec<EditRecord>,
    consensus_changed: EventChannel<EditRange>,
    undo_state_changed: EventChannel<bool>,
    redo_state_changed: EventChannel<bool>,
}

impl<T: SequenceTrace> EditableConsensus<T> {
    pub fn new(traces: Vec<T>, settings: Option<Rc<ConsensusSettings>>) -> Result<Self> {
        Ok(Self::from_builder(ConsensusBuilder::new(traces, settings)?))
    }

    pub fn with_aligner(
        traces: Vec<T>,
        settings: Option<Rc<ConsensusSettings>>,
        aligner: &dyn SequenceAligner,
    ) -> Result<Self> {
        Ok(Self::from_builder(ConsensusBuilder::with_aligner(
            traces, settings, aligner,
        )?))
    }

    pub fn from_builder(builder: ConsensusBuilder<T>) -> Self {
        Self {
            builder,
            undo_stack: vec![],
            redo_stack: vec![],
            consensus_changed: EventChannel::new(),
            undo_state_changed: EventChannel::new(),
            redo_state_changed: EventChannel::new(),
        }
    }

    #[inline(always)]
    pub fn builder(&self) -> &ConsensusBuilder<T> {
        &self.builder
    }

    #[inline(always)]
    pub fn consensus(&self) -> &[u8] {
        self.builder.consensus()
    }

    pub fn consensus_range(&self, start: usize, end: usize) -> Result<&[u8]> {
        self.builder.consensus_range(start, end)
    }

    pub fn compact_consensus(&self) -> Vec<u8> {
        self.builder.compact_consensus()
    }

    pub fn consensus_changed(&self) -> &EventChannel<EditRange> {
        &self.consensus_changed
    }

    pub fn undo_state_changed(&self) -> &EventChannel<bool> {
        &self.undo_state_changed
    }

    pub fn redo_state_changed(&self) -> &EventChannel<bool> {
        &self.redo_state_changed
    }

    #[inline(always)]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[inline(always)]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[inline(always)]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[inline(always)]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Blanks the positions between `start` and `end`, in either order.
    pub fn delete_bases(&mut self, start: usize, end: usize) -> Result<()> {
        let (start, end) = Self::ordered(start, end);
        self.builder.checked_range(start, end)?;
        let blanks = vec![TRIMMED; end - start + 1];
        self.apply_edit(start, end, &blanks);
        Ok(())
    }

    /// Overwrites the positions between `start` and `end`, in either order,
    /// with `new_bases`, which must have exactly that length.
    pub fn modify_bases(&mut self, start: usize, end: usize, new_bases: &[u8]) -> Result<()> {
        let (start, end) = Self::ordered(start, end);
        if new_bases.len() != end - start + 1 {
            return Err(ConsensusError::LengthMismatch {
                expected: end - start + 1,
                actual: new_bases.len(),
            });
        }
        self.builder.checked_range(start, end)?;
        self.apply_edit(start, end, new_bases);
        Ok(())
    }

    /// Rebuilds the consensus, e.g. after the settings changed. A rebuild
    /// that changes the sequence can be undone as a whole.
    pub fn recalc_consensus_sequence(&mut self) {
        let old = self.builder.consensus().to_vec();
        self.builder.make_consensus_sequence();
        if old.as_slice() == self.builder.consensus() || old.is_empty() {
            return;
        }
        let end = old.len() - 1;
        log::trace!("Recalculated consensus differs, recording {} positions", old.len());
        self.record_edit(EditRecord {
            start: 0,
            end,
            prior_data: old,
        });
    }

    /// Reverts the most recent change. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        log::trace!("Undo {}..={}", record.start, record.end);
        let range = self.restore(&record);
        self.redo_stack.push(range);
        self.consensus_changed.publish(&EditRange {
            start: record.start,
            end: record.end,
        });
        if self.redo_stack.len() == 1 {
            self.redo_state_changed.publish(&true);
        }
        if self.undo_stack.is_empty() {
            self.undo_state_changed.publish(&false);
        }
        true
    }

    /// Reapplies the most recently undone change. Returns false if there was
    /// none.
    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        log::trace!("Redo {}..={}", record.start, record.end);
        let range = self.restore(&record);
        self.undo_stack.push(range);
        self.consensus_changed.publish(&EditRange {
            start: record.start,
            end: record.end,
        });
        if self.undo_stack.len() == 1 {
            self.undo_state_changed.publish(&true);
        }
        if self.redo_stack.is_empty() {
            self.redo_state_changed.publish(&false);
        }
        true
    }

    #[inline(always)]
    fn ordered(start: usize, end: usize) -> (usize, usize) {
        if start > end { (end, start) } else { (start, end) }
    }

    /// Writes `data` at `start..=end` after recording what was there.
    fn apply_edit(&mut self, start: usize, end: usize, data: &[u8]) {
        let prior_data = self.builder.replace_range(start, data);
        log::trace!("Edited consensus {start}..={end}");
        self.record_edit(EditRecord {
            start,
            end,
            prior_data,
        });
    }

    /// Pushes an undo record for a change that was just made and announces it.
    fn record_edit(&mut self, record: EditRecord) {
        let range = EditRange {
            start: record.start,
            end: record.end,
        };
        self.undo_stack.push(record);
        self.consensus_changed.publish(&range);
        if self.undo_stack.len() == 1 {
            self.undo_state_changed.publish(&true);
        }
    }

    /// Puts a record's data back and returns the record that reverses it.
    fn restore(&mut self, record: &EditRecord) -> EditRecord {
        let prior_data = self.builder.replace_range(record.start, &record.prior_data);
        EditRecord {
            start: record.start,
            end: record.end,
            prior_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consensus_settings::{ConsensusAlgorithm, SettingsSnapshot},
        sequence_trace::BasicTrace,
    };
    use std::cell::{Cell, RefCell};

    fn editable(calls: &[u8]) -> EditableConsensus<BasicTrace> {
        let settings = SettingsSnapshot {
            auto_trim: false,
            ..SettingsSnapshot::default()
        };
        EditableConsensus::new(
            vec![BasicTrace::with_uniform_confidence(calls, 40)],
            Some(Rc::new(ConsensusSettings::from_snapshot(&settings).unwrap())),
        )
        .unwrap()
    }

    fn record_states(channel: &EventChannel<bool>) -> Rc<RefCell<Vec<bool>>> {
        let states = Rc::new(RefCell::new(vec![]));
        let s = Rc::clone(&states);
        channel.subscribe(move |state| s.borrow_mut().push(*state));
        states
    }

    #[test]
    fn test_delete_bases() {
        let mut cons = editable(b"ACGTACGT");
        let ranges = Rc::new(RefCell::new(vec![]));
        let r = Rc::clone(&ranges);
        cons.consensus_changed()
            .subscribe(move |range| r.borrow_mut().push(*range));
        let undo_states = record_states(cons.undo_state_changed());

        cons.delete_bases(2, 4).unwrap();
        assert_eq!(cons.consensus(), b"AC   CGT");
        assert_eq!(cons.compact_consensus(), b"ACCGT");
        assert_eq!(*ranges.borrow(), vec![EditRange { start: 2, end: 4 }]);
        assert_eq!(*undo_states.borrow(), vec![true]);
        assert!(cons.can_undo());
        assert!(!cons.can_redo());
    }

    #[test]
    fn test_delete_bases_swapped_arguments() {
        let mut forward = editable(b"ACGTACGT");
        let mut swapped = editable(b"ACGTACGT");
        forward.delete_bases(1, 5).unwrap();
        swapped.delete_bases(5, 1).unwrap();
        assert_eq!(forward.consensus(), swapped.consensus());
        assert_eq!(forward.undo_stack, swapped.undo_stack);
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut cons = editable(b"ACGT");
        assert!(matches!(
            cons.delete_bases(2, 4),
            Err(ConsensusError::IndexOutOfRange { .. })
        ));
        assert_eq!(cons.consensus(), b"ACGT");
        assert!(!cons.can_undo());
    }

    #[test]
    fn test_modify_bases_length_mismatch() {
        let mut cons = editable(b"ACGTACGT");
        assert!(matches!(
            cons.modify_bases(0, 2, b"TT"),
            Err(ConsensusError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(cons.consensus(), b"ACGTACGT");
        assert_eq!(cons.undo_depth(), 0);
    }

    #[test]
    fn test_modify_undo_redo_round_trip() {
        let mut cons = editable(b"ACGTACGT");
        cons.modify_bases(5, 3, b"GGG").unwrap();
        assert_eq!(cons.consensus(), b"ACGGGGGT");
        let edited = cons.consensus().to_vec();

        assert!(cons.undo());
        assert_eq!(cons.consensus(), b"ACGTACGT");
        assert_eq!(cons.consensus_range(3, 5).unwrap(), b"TAC");

        assert!(cons.redo());
        assert_eq!(cons.consensus(), edited.as_slice());
        assert!(cons.can_undo());
        assert!(!cons.can_redo());
    }

    #[test]
    fn test_undo_redo_on_empty_stacks() {
        let mut cons = editable(b"ACGT");
        let changes = Rc::new(Cell::new(0));
        let c = Rc::clone(&changes);
        cons.consensus_changed().subscribe(move |_| c.set(c.get() + 1));
        assert!(!cons.undo());
        assert!(!cons.redo());
        assert_eq!(changes.get(), 0);
        assert_eq!(cons.consensus(), b"ACGT");
    }

    #[test]
    fn test_availability_flips_only_at_boundary() {
        let mut cons = editable(b"ACGTACGTAC");
        let undo_states = record_states(cons.undo_state_changed());
        let redo_states = record_states(cons.redo_state_changed());

        cons.delete_bases(0, 0).unwrap();
        cons.modify_bases(2, 3, b"AA").unwrap();
        cons.delete_bases(8, 9).unwrap();
        assert_eq!(*undo_states.borrow(), vec![true]);
        assert_eq!(cons.undo_depth(), 3);

        cons.undo();
        assert_eq!(*undo_states.borrow(), vec![true]);
        assert_eq!(*redo_states.borrow(), vec![true]);
        cons.undo();
        assert_eq!(*redo_states.borrow(), vec![true]);
        cons.undo();
        assert_eq!(*undo_states.borrow(), vec![true, false]);
        assert_eq!(cons.consensus(), b"ACGTACGTAC");

        cons.redo();
        assert_eq!(*undo_states.borrow(), vec![true, false, true]);
        cons.redo();
        cons.redo();
        assert_eq!(*redo_states.borrow(), vec![true, false]);
        assert_eq!(cons.consensus(), b" CAAACGT  ");
    }

    #[test]
    fn test_recalc_records_whole_sequence() {
        let settings = Rc::new(
            ConsensusSettings::from_snapshot(&SettingsSnapshot {
                auto_trim: false,
                ..SettingsSnapshot::default()
            })
            .unwrap(),
        );
        let mut cons = EditableConsensus::new(
            vec![BasicTrace::new(b"ACGT", &[40, 25, 40, 25]).unwrap()],
            Some(Rc::clone(&settings)),
        )
        .unwrap();
        let ranges = Rc::new(RefCell::new(vec![]));
        let r = Rc::clone(&ranges);
        cons.consensus_changed()
            .subscribe(move |range| r.borrow_mut().push(*range));
        assert_eq!(cons.consensus(), b"ANGN");

        // Same settings, same result: nothing recorded
        cons.recalc_consensus_sequence();
        assert_eq!(cons.undo_depth(), 0);
        assert!(ranges.borrow().is_empty());

        settings.set_min_conf_score(20).unwrap();
        cons.recalc_consensus_sequence();
        assert_eq!(cons.consensus(), b"ACGT");
        assert_eq!(cons.undo_depth(), 1);
        assert_eq!(*ranges.borrow(), vec![EditRange { start: 0, end: 3 }]);

        cons.undo();
        assert_eq!(cons.consensus(), b"ANGN");
    }

    #[test]
    fn test_recalc_after_algorithm_change() {
        let settings = Rc::new(ConsensusSettings::new());
        settings.set_auto_trim(false);
        let aligner = |a: &[u8], b: &[u8]| {
            crate::pairwise_alignment::PairwiseAlignment::new(a.to_vec(), b.to_vec())
        };
        let mut cons = EditableConsensus::with_aligner(
            vec![
                BasicTrace::new(b"AC", &[40, 40]).unwrap(),
                BasicTrace::new(b"AG", &[40, 20]).unwrap(),
            ],
            Some(Rc::clone(&settings)),
            &aligner,
        )
        .unwrap();
        // C(40) against G(20) is not confident enough for a Bayesian call
        assert_eq!(cons.consensus(), b"AN");

        settings
            .set_consensus_algorithm(ConsensusAlgorithm::Legacy)
            .unwrap();
        cons.recalc_consensus_sequence();
        assert_eq!(cons.consensus(), b"AC");
        assert_eq!(cons.undo_depth(), 1);

        settings.set_min_conf_score(20).unwrap();
        cons.recalc_consensus_sequence();
        assert_eq!(cons.consensus(), b"AN");
        assert_eq!(cons.undo_depth(), 2);
    }
}
