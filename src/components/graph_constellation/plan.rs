//! Reveal schedule computed once per document.

use std::collections::BTreeMap;

use super::config::AnimationMode;
use super::types::{ElementRef, GraphDocument};

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedReveal {
	pub element: ElementRef,
	pub stage: usize,
	pub order: usize,
	/// Offset from the start of the stage, in milliseconds.
	pub delay: f64,
}

#[derive(Clone, Debug, Default)]
pub struct RevealPlan {
	entries: Vec<PlannedReveal>,
	max_stage: usize,
}

struct Pending {
	element: ElementRef,
	order: Option<usize>,
	delay: Option<f64>,
}

impl RevealPlan {
	/// Build the schedule. Within a stage elements are sorted stably by order;
	/// a missing order falls back to the element's declaration rank in that
	/// stage (nodes before relationships). Each delay is the declared delay
	/// plus `order * (window / count_in_stage)`.
	pub fn build(
		doc: &GraphDocument,
		mode: AnimationMode,
		stage_duration: f64,
		animation_duration: f64,
	) -> Self {
		let staged = mode == AnimationMode::Staged;
		let mut groups: BTreeMap<usize, Vec<Pending>> = BTreeMap::new();

		let nodes = doc.nodes.iter().map(|n| {
			(
				n.animation_stage,
				Pending {
					element: ElementRef::Node(n.id.clone()),
					order: n.animation_order,
					delay: n.animation_delay,
				},
			)
		});
		let edges = doc.relationships.iter().map(|r| {
			(
				r.animation_stage,
				Pending {
					element: ElementRef::Edge(r.id.clone()),
					order: r.animation_order,
					delay: r.animation_delay,
				},
			)
		});
		for (stage, pending) in nodes.chain(edges) {
			let stage = if staged { stage.unwrap_or(0) } else { 0 };
			groups.entry(stage).or_default().push(pending);
		}

		let window = if staged {
			stage_duration
		} else {
			animation_duration
		};
		let mut entries = Vec::new();
		for (&stage, group) in &groups {
			let step = window / group.len() as f64;
			let mut planned: Vec<PlannedReveal> = group
				.iter()
				.enumerate()
				.map(|(rank, p)| {
					let order = p.order.unwrap_or(rank);
					PlannedReveal {
						element: p.element.clone(),
						stage,
						order,
						delay: p.delay.unwrap_or(0.0) + order as f64 * step,
					}
				})
				.collect();
			planned.sort_by_key(|p| p.order);
			entries.extend(planned);
		}

		Self {
			max_stage: groups.keys().next_back().copied().unwrap_or(0),
			entries,
		}
	}

	pub fn max_stage(&self) -> usize {
		self.max_stage
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn entries(&self) -> &[PlannedReveal] {
		&self.entries
	}

	pub fn stage(&self, stage: usize) -> impl Iterator<Item = &PlannedReveal> {
		self.entries.iter().filter(move |p| p.stage == stage)
	}

	pub fn stage_of(&self, element: &ElementRef) -> Option<usize> {
		self.entries
			.iter()
			.find(|p| &p.element == element)
			.map(|p| p.stage)
	}

	/// Latest reveal delay within a stage; zero for an empty stage.
	pub fn stage_window(&self, stage: usize) -> f64 {
		self.stage(stage).map(|p| p.delay).fold(0.0, f64::max)
	}
}
