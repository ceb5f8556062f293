use crate::{
    error::{ConsensusError, Result},
    observable::{EventChannel, ValueChange},
};
use serde::{Deserialize, Serialize};
use std::{cell::Cell, fmt, str::FromStr};

pub const MIN_CONF_SCORE_LOWER: u8 = 1;
pub const MIN_CONF_SCORE_UPPER: u8 = 61;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusAlgorithm {
    #[default]
    Bayesian,
    #[serde(rename = "legacy")]
    Legacy,
}

impl ConsensusAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            ConsensusAlgorithm::Bayesian => "Bayesian",
            ConsensusAlgorithm::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ConsensusAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ConsensusAlgorithm {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bayesian" => Ok(ConsensusAlgorithm::Bayesian),
            "legacy" => Ok(ConsensusAlgorithm::Legacy),
            _ => Err(ConsensusError::Config(format!(
                "Unknown consensus algorithm '{s}'"
            ))),
        }
    }
}

/// Plain copy of every consensus setting, used for batch updates and JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSnapshot {
    pub min_conf_score: u8,
    pub consensus_algorithm: ConsensusAlgorithm,
    pub auto_trim: bool,
    pub auto_trim_window: usize,
    pub auto_trim_base_count: usize,
    pub trim_end_gaps: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            min_conf_score: 30,
            consensus_algorithm: ConsensusAlgorithm::Bayesian,
            auto_trim: true,
            auto_trim_window: 10,
            auto_trim_base_count: 8,
            trim_end_gaps: true,
        }
    }
}

impl SettingsSnapshot {
    pub fn from_json_str(json_text: &str) -> Result<Self> {
        Ok(serde_json::from_str(json_text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Observable settings that control how a consensus sequence is built and
/// finished.
///
/// Setters take `&self` so one store can be shared through an `Rc` between
/// the consensus builder and whatever edits the settings. Every setter that
/// actually changes a value publishes its field-specific event followed by
/// `settings_changed`; inside [`ConsensusSettings::set_all`] the generic event
/// is collapsed into a single publication at the end of the batch.
#[derive(Debug)]
pub struct ConsensusSettings {
    min_conf_score: Cell<u8>,
    consensus_algorithm: Cell<ConsensusAlgorithm>,
    auto_trim: Cell<bool>,
    auto_trim_window: Cell<usize>,
    auto_trim_base_count: Cell<usize>,
    trim_end_gaps: Cell<bool>,

    notify_all: Cell<bool>,
    change_made: Cell<bool>,

    settings_changed: EventChannel<()>,
    min_conf_score_changed: EventChannel<ValueChange<u8>>,
    auto_trim_changed: EventChannel<()>,
    consensus_algorithm_changed: EventChannel<ValueChange<ConsensusAlgorithm>>,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusSettings {
    pub fn new() -> Self {
        let defaults = SettingsSnapshot::default();
        Self {
            min_conf_score: Cell::new(defaults.min_conf_score),
            consensus_algorithm: Cell::new(defaults.consensus_algorithm),
            auto_trim: Cell::new(defaults.auto_trim),
            auto_trim_window: Cell::new(defaults.auto_trim_window),
            auto_trim_base_count: Cell::new(defaults.auto_trim_base_count),
            trim_end_gaps: Cell::new(defaults.trim_end_gaps),
            notify_all: Cell::new(true),
            change_made: Cell::new(false),
            settings_changed: EventChannel::new(),
            min_conf_score_changed: EventChannel::new(),
            auto_trim_changed: EventChannel::new(),
            consensus_algorithm_changed: EventChannel::new(),
        }
    }

    /// Builds a store from a snapshot, validating every value.
    pub fn from_snapshot(snapshot: &SettingsSnapshot) -> Result<Self> {
        let ret = Self::new();
        ret.set_all(snapshot)?;
        Ok(ret)
    }

    pub fn from_json_str(json_text: &str) -> Result<Self> {
        Self::from_snapshot(&SettingsSnapshot::from_json_str(json_text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        self.snapshot().to_json_string()
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            min_conf_score: self.min_conf_score(),
            consensus_algorithm: self.consensus_algorithm(),
            auto_trim: self.auto_trim(),
            auto_trim_window: self.auto_trim_window(),
            auto_trim_base_count: self.auto_trim_base_count(),
            trim_end_gaps: self.trim_end_gaps(),
        }
    }

    /// Copies all values from `other` without publishing any events.
    pub fn copy_from(&self, other: &ConsensusSettings) {
        self.min_conf_score.set(other.min_conf_score());
        self.consensus_algorithm.set(other.consensus_algorithm());
        self.auto_trim.set(other.auto_trim());
        self.auto_trim_window.set(other.auto_trim_window());
        self.auto_trim_base_count.set(other.auto_trim_base_count());
        self.trim_end_gaps.set(other.trim_end_gaps());
    }

    /// Applies every value in `snapshot` and publishes at most one
    /// `settings_changed`, even if a value fails validation. Values applied
    /// before a failing one are kept.
    pub fn set_all(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        let result = {
            let _pause = NotificationPause::new(self);
            self.set_min_conf_score(snapshot.min_conf_score)
                .and_then(|_| self.set_consensus_algorithm(snapshot.consensus_algorithm))
                .map(|_| self.set_auto_trim(snapshot.auto_trim))
                .and_then(|_| {
                    self.set_auto_trim_params(
                        snapshot.auto_trim_window,
                        snapshot.auto_trim_base_count,
                    )
                })
                .map(|_| self.set_trim_end_gaps(snapshot.trim_end_gaps))
        };
        if self.change_made.replace(false) {
            self.settings_changed.publish(&());
        }
        result
    }

    #[inline(always)]
    pub fn min_conf_score(&self) -> u8 {
        self.min_conf_score.get()
    }

    pub fn set_min_conf_score(&self, new_value: u8) -> Result<()> {
        if !(MIN_CONF_SCORE_LOWER..=MIN_CONF_SCORE_UPPER).contains(&new_value) {
            return Err(ConsensusError::Config(format!(
                "Confidence score values must be between {MIN_CONF_SCORE_LOWER} and {MIN_CONF_SCORE_UPPER}, inclusive (got {new_value})"
            )));
        }
        let old = self.min_conf_score.get();
        if old != new_value {
            self.min_conf_score.set(new_value);
            self.min_conf_score_changed.publish(&ValueChange {
                new: new_value,
                old,
            });
            self.mark_changed();
        }
        Ok(())
    }

    #[inline(always)]
    pub fn consensus_algorithm(&self) -> ConsensusAlgorithm {
        self.consensus_algorithm.get()
    }

    pub fn set_consensus_algorithm(&self, new_value: ConsensusAlgorithm) -> Result<()> {
        let old = self.consensus_algorithm.get();
        if old != new_value {
            self.consensus_algorithm.set(new_value);
            self.consensus_algorithm_changed.publish(&ValueChange {
                new: new_value,
                old,
            });
            self.mark_changed();
        }
        Ok(())
    }

    /// Sets the algorithm from its name, e.g. "Bayesian" or "legacy".
    pub fn set_consensus_algorithm_name(&self, name: &str) -> Result<()> {
        self.set_consensus_algorithm(name.parse()?)
    }

    #[inline(always)]
    pub fn auto_trim(&self) -> bool {
        self.auto_trim.get()
    }

    pub fn set_auto_trim(&self, new_value: bool) {
        if self.auto_trim.get() != new_value {
            self.auto_trim.set(new_value);
            self.auto_trim_changed.publish(&());
            self.mark_changed();
        }
    }

    #[inline(always)]
    pub fn auto_trim_window(&self) -> usize {
        self.auto_trim_window.get()
    }

    #[inline(always)]
    pub fn auto_trim_base_count(&self) -> usize {
        self.auto_trim_base_count.get()
    }

    /// Returns `(window size, minimum good bases per window)`.
    #[inline(always)]
    pub fn auto_trim_params(&self) -> (usize, usize) {
        (self.auto_trim_window(), self.auto_trim_base_count())
    }

    pub fn set_auto_trim_params(&self, window: usize, base_count: usize) -> Result<()> {
        if window == 0 {
            return Err(ConsensusError::Config(
                "The trimming window size must be at least 1".to_string(),
            ));
        }
        if base_count > window {
            return Err(ConsensusError::Config(format!(
                "The number of correct base calls ({base_count}) cannot exceed the window size ({window})"
            )));
        }
        if self.auto_trim_params() != (window, base_count) {
            self.auto_trim_window.set(window);
            self.auto_trim_base_count.set(base_count);
            self.auto_trim_changed.publish(&());
            self.mark_changed();
        }
        Ok(())
    }

    #[inline(always)]
    pub fn trim_end_gaps(&self) -> bool {
        self.trim_end_gaps.get()
    }

    pub fn set_trim_end_gaps(&self, new_value: bool) {
        if self.trim_end_gaps.get() != new_value {
            self.trim_end_gaps.set(new_value);
            self.auto_trim_changed.publish(&());
            self.mark_changed();
        }
    }

    /// True while a [`ConsensusSettings::set_all`] batch is running.
    #[inline(always)]
    pub fn is_batch_in_progress(&self) -> bool {
        !self.notify_all.get()
    }

    pub fn settings_changed(&self) -> &EventChannel<()> {
        &self.settings_changed
    }

    pub fn min_conf_score_changed(&self) -> &EventChannel<ValueChange<u8>> {
        &self.min_conf_score_changed
    }

    /// Published for changes of the auto-trim flag, the trim parameters and
    /// the end-gap flag.
    pub fn auto_trim_changed(&self) -> &EventChannel<()> {
        &self.auto_trim_changed
    }

    pub fn consensus_algorithm_changed(&self) -> &EventChannel<ValueChange<ConsensusAlgorithm>> {
        &self.consensus_algorithm_changed
    }

    fn mark_changed(&self) {
        if self.notify_all.get() {
            self.settings_changed.publish(&());
        } else {
            self.change_made.set(true);
        }
    }
}

/// Suppresses `settings_changed` until dropped.
struct NotificationPause<'a> {
    settings: &'a ConsensusSettings,
}

impl<'a> NotificationPause<'a> {
    fn new(settings: &'a ConsensusSettings) -> Self {
        settings.notify_all.set(false);
        settings.change_made.set(false);
        Self { settings }
    }
}

impl Drop for NotificationPause<'_> {
    fn drop(&mut self) {
        self.settings.notify_all.set(true);
    }
}
