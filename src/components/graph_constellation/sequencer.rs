//! Stage sequencer.
//!
//! Drives a [`RevealPlan`] through `Idle -> Revealing(s) -> Settled(s) -> ... -> Complete`.
//! Reveal timers are one-shot and owned here, advanced by the caller's clock,
//! so cancelling is just dropping them.

use std::collections::HashSet;

use log::{debug, info};

use super::config::AnimationMode;
use super::plan::RevealPlan;
use super::types::ElementRef;

/// Time after the last reveal of a stage before the stage counts as settled.
pub const SETTLE_BUFFER_MS: f64 = 500.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
	Idle,
	Revealing(usize),
	Settled(usize),
	Complete,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SequencerEvent {
	StageBegin(usize),
	Reveal { element: ElementRef, instant: bool },
	Hide(ElementRef),
	StageComplete(usize),
	AnimationComplete,
}

#[derive(Debug)]
struct Timer {
	due: f64,
	element: ElementRef,
}

pub struct StageSequencer {
	plan: RevealPlan,
	mode: AnimationMode,
	auto_advance: bool,
	state: SequencerState,
	clock: f64,
	timers: Vec<Timer>,
	settle_at: Option<f64>,
	revealed: HashSet<ElementRef>,
}

impl StageSequencer {
	pub fn new(plan: RevealPlan, mode: AnimationMode, auto_advance: bool) -> Self {
		Self {
			plan,
			mode,
			auto_advance,
			state: SequencerState::Idle,
			clock: 0.0,
			timers: Vec::new(),
			settle_at: None,
			revealed: HashSet::new(),
		}
	}

	pub fn state(&self) -> SequencerState {
		self.state
	}

	pub fn plan(&self) -> &RevealPlan {
		&self.plan
	}

	pub fn pending_timers(&self) -> usize {
		self.timers.len()
	}

	pub fn is_revealed(&self, element: &ElementRef) -> bool {
		self.revealed.contains(element)
	}

	/// Stage the sequencer is on, if it has started.
	pub fn current_stage(&self) -> Option<usize> {
		match self.state {
			SequencerState::Idle => None,
			SequencerState::Revealing(s) | SequencerState::Settled(s) => Some(s),
			SequencerState::Complete => Some(self.plan.max_stage()),
		}
	}

	pub fn start(&mut self, stage: usize) -> Vec<SequencerEvent> {
		let mut events = Vec::new();
		if self.state != SequencerState::Idle {
			return events;
		}
		let stage = match self.mode {
			AnimationMode::Continuous => 0,
			AnimationMode::Staged => stage.min(self.plan.max_stage()),
		};
		self.begin_stage(stage, self.clock, &mut events);
		events
	}

	/// Resync to the host's stage index.
	pub fn set_stage(&mut self, stage: usize) -> Vec<SequencerEvent> {
		if self.mode == AnimationMode::Continuous {
			return Vec::new();
		}
		let Some(current) = self.current_stage() else {
			return self.start(stage);
		};
		let stage = stage.min(self.plan.max_stage());
		let mut events = Vec::new();
		if stage > current {
			self.begin_stage(stage, self.clock, &mut events);
		} else if stage < current {
			self.rewind_to(stage, &mut events);
		}
		events
	}

	/// Advance the clock by `dt` milliseconds and fire everything that came due.
	pub fn advance(&mut self, dt: f64) -> Vec<SequencerEvent> {
		let mut events = Vec::new();
		if matches!(self.state, SequencerState::Idle) {
			return events;
		}
		self.clock += dt;
		loop {
			while self.timers.first().is_some_and(|t| t.due <= self.clock) {
				let timer = self.timers.remove(0);
				self.revealed.insert(timer.element.clone());
				events.push(SequencerEvent::Reveal {
					element: timer.element,
					instant: false,
				});
			}
			let SequencerState::Revealing(stage) = self.state else {
				break;
			};
			match self.settle_at {
				Some(at) if at <= self.clock => {
					if !self.settle(stage, at, &mut events) {
						break;
					}
				}
				_ => break,
			}
		}
		events
	}

	/// Drop every pending timer and return to `Idle`.
	pub fn cancel(&mut self) {
		if !self.timers.is_empty() {
			debug!("sequencer: cancelled {} pending reveals", self.timers.len());
		}
		self.timers.clear();
		self.settle_at = None;
		self.state = SequencerState::Idle;
	}

	fn begin_stage(&mut self, stage: usize, at: f64, events: &mut Vec<SequencerEvent>) {
		self.timers.clear();
		for entry in self.plan.entries() {
			if entry.stage < stage && self.revealed.insert(entry.element.clone()) {
				events.push(SequencerEvent::Reveal {
					element: entry.element.clone(),
					instant: true,
				});
			}
		}

		self.state = SequencerState::Revealing(stage);
		events.push(SequencerEvent::StageBegin(stage));
		self.timers = self
			.plan
			.stage(stage)
			.filter(|p| !self.revealed.contains(&p.element))
			.map(|p| Timer {
				due: at + p.delay,
				element: p.element.clone(),
			})
			.collect();
		self.timers.sort_by(|a, b| a.due.total_cmp(&b.due));
		self.settle_at = Some(at + self.plan.stage_window(stage) + SETTLE_BUFFER_MS);
		info!("sequencer: revealing stage {} ({} timers)", stage, self.timers.len());
	}

	/// Returns true when another stage was started and the loop should continue.
	fn settle(&mut self, stage: usize, at: f64, events: &mut Vec<SequencerEvent>) -> bool {
		self.settle_at = None;
		self.state = SequencerState::Settled(stage);
		if self.mode == AnimationMode::Staged {
			events.push(SequencerEvent::StageComplete(stage));
		}
		if stage >= self.plan.max_stage() {
			self.state = SequencerState::Complete;
			events.push(SequencerEvent::AnimationComplete);
			info!("sequencer: animation complete");
			return false;
		}
		if self.auto_advance {
			self.begin_stage(stage + 1, at, events);
			return true;
		}
		false
	}

	fn rewind_to(&mut self, stage: usize, events: &mut Vec<SequencerEvent>) {
		self.timers.clear();
		self.settle_at = None;
		for entry in self.plan.entries().iter().rev() {
			if entry.stage > stage && self.revealed.remove(&entry.element) {
				events.push(SequencerEvent::Hide(entry.element.clone()));
			}
		}
		self.state = SequencerState::Settled(stage);
		info!("sequencer: rewound to stage {}", stage);
	}
}
