use crate::error::{ConsensusError, Result};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Read access to a base-called sequencing trace.
pub trait SequenceTrace {
    fn base_calls(&self) -> &[u8];

    /// Phred-type confidence of the base call at `index`.
    fn base_call_conf(&self, index: usize) -> u8;
}

impl<T: SequenceTrace + ?Sized> SequenceTrace for Rc<T> {
    #[inline(always)]
    fn base_calls(&self) -> &[u8] {
        (**self).base_calls()
    }

    #[inline(always)]
    fn base_call_conf(&self, index: usize) -> u8 {
        (**self).base_call_conf(index)
    }
}

impl<T: SequenceTrace + ?Sized> SequenceTrace for Box<T> {
    #[inline(always)]
    fn base_calls(&self) -> &[u8] {
        (**self).base_calls()
    }

    #[inline(always)]
    fn base_call_conf(&self, index: usize) -> u8 {
        (**self).base_call_conf(index)
    }
}

/// Base calls with one confidence score per call, as read from a trace file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicTrace {
    base_calls: Vec<u8>,
    confidences: Vec<u8>,
}

impl BasicTrace {
    pub fn new(base_calls: &[u8], confidences: &[u8]) -> Result<Self> {
        if base_calls.len() != confidences.len() {
            return Err(ConsensusError::Trace(format!(
                "{} base calls but {} confidence scores",
                base_calls.len(),
                confidences.len()
            )));
        }
        Ok(Self {
            base_calls: base_calls.iter().map(|c| c.to_ascii_uppercase()).collect(),
            confidences: confidences.to_vec(),
        })
    }

    /// A trace where every call has the same confidence.
    pub fn with_uniform_confidence(base_calls: &[u8], confidence: u8) -> Self {
        Self {
            base_calls: base_calls.iter().map(|c| c.to_ascii_uppercase()).collect(),
            confidences: vec![confidence; base_calls.len()],
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.base_calls.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.base_calls.is_empty()
    }

    #[inline(always)]
    pub fn confidences(&self) -> &[u8] {
        &self.confidences
    }

    /// The trace as read from the opposite strand. Confidences follow their
    /// base calls.
    pub fn reverse_complement(&self) -> Self {
        Self {
            base_calls: self
                .base_calls
                .iter()
                .rev()
                .map(|c| Self::complement(*c))
                .collect(),
            confidences: self.confidences.iter().rev().copied().collect(),
        }
    }

    #[inline(always)]
    fn complement(base: u8) -> u8 {
        match base {
            b'A' => b'T',
            b'T' => b'A',
            b'G' => b'C',
            b'C' => b'G',
            other => other,
        }
    }
}

impl SequenceTrace for BasicTrace {
    #[inline(always)]
    fn base_calls(&self) -> &[u8] {
        &self.base_calls
    }

    #[inline(always)]
    fn base_call_conf(&self, index: usize) -> u8 {
        self.confidences.get(index).copied().unwrap_or(0)
    }
}
