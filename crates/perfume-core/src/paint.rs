//! Paint milestone tracking
//!
//! Each paint milestone moves `Unobserved -> Observing -> Fulfilled`. The
//! engine arms the enabled milestones at construction and feeds every batch of
//! platform paint entries through [`PaintObserver::accept`], which returns the
//! entries that still need dispatching.

use crate::milestone::Milestone;
use crate::timing::{PaintTiming, FIRST_CONTENTFUL_PAINT, FIRST_PAINT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MilestoneState {
    #[default]
    Unobserved,
    Observing,
    Fulfilled,
}

#[derive(Debug, Default)]
pub struct PaintObserver {
    first_paint: MilestoneState,
    first_contentful_paint: MilestoneState,
}

impl PaintObserver {
    pub fn new(first_paint: bool, first_contentful_paint: bool) -> Self {
        let armed = |enabled: bool| {
            if enabled {
                MilestoneState::Observing
            } else {
                MilestoneState::Unobserved
            }
        };
        Self {
            first_paint: armed(first_paint),
            first_contentful_paint: armed(first_contentful_paint),
        }
    }

    pub fn state(&self, milestone: Milestone) -> MilestoneState {
        match milestone {
            Milestone::FirstPaint => self.first_paint,
            Milestone::FirstContentfulPaint => self.first_contentful_paint,
            _ => MilestoneState::Unobserved,
        }
    }

    pub fn is_observing(&self) -> bool {
        self.first_paint == MilestoneState::Observing
            || self.first_contentful_paint == MilestoneState::Observing
    }

    /// Match entries against observing milestones; each milestone fulfils once
    pub fn accept(&mut self, entries: &[PaintTiming]) -> Vec<(Milestone, f64)> {
        let mut matched = Vec::new();
        for entry in entries {
            let slot = match entry.name.as_str() {
                FIRST_PAINT => Some((Milestone::FirstPaint, &mut self.first_paint)),
                FIRST_CONTENTFUL_PAINT => Some((
                    Milestone::FirstContentfulPaint,
                    &mut self.first_contentful_paint,
                )),
                _ => None,
            };
            if let Some((milestone, state)) = slot {
                if *state == MilestoneState::Observing {
                    *state = MilestoneState::Fulfilled;
                    matched.push((milestone, entry.start_time));
                }
            }
        }
        matched
    }
}
