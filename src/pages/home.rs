use leptos::prelude::*;
use log::error;

use crate::components::graph_constellation::{
	AnimationMode, DisplaySettings, GraphConstellation, GraphDocument,
};

const SAMPLE_DOCUMENT: &str = include_str!("../../assets/constellation.json");

/// Host controls around a constellation: stage stepping, mode and replay.
#[component]
fn ConstellationDemo(document: GraphDocument) -> impl IntoView {
	let max_stage = document.max_stage();
	let stage = RwSignal::new(0usize);
	let mode = RwSignal::new(AnimationMode::Staged);
	let auto_advance = RwSignal::new(false);
	let replay = RwSignal::new(0u32);
	let (status, set_status) = signal(String::from("Animating…"));

	let on_stage_complete = Callback::new(move |s: usize| {
		set_status.set(format!("Stage {} of {} revealed", s + 1, max_stage + 1));
	});
	let on_animation_complete = Callback::new(move |_: ()| set_status.set("Animation complete".into()));

	let graph = move || {
		let animation_mode = mode.get();
		let auto_advance_stages = auto_advance.get();
		set_status.set("Animating…".into());
		view! {
			<GraphConstellation
				document=document.clone()
				fullscreen=true
				animation_mode=animation_mode
				auto_advance_stages=auto_advance_stages
				current_stage=stage
				replay=replay
				on_stage_complete=on_stage_complete
				on_animation_complete=on_animation_complete
				initial_settings=DisplaySettings::default()
			/>
		}
	};

	view! {
		<div class="fullscreen-graph">
			{graph}
			<div class="graph-overlay">
				<h1>"Graph Constellation"</h1>
				<p class="subtitle">
					"Drag nodes to pin them. Click a node for details. Scroll to zoom. Drag background to pan."
				</p>
				<div class="stage-controls">
					<button
						disabled=move || stage.get() == 0
						on:click=move |_| stage.update(|s| *s = s.saturating_sub(1))
					>
						"Previous stage"
					</button>
					<span>{move || format!("Stage {} / {}", stage.get(), max_stage)}</span>
					<button
						disabled=move || stage.get() >= max_stage
						on:click=move |_| stage.update(|s| *s = (*s + 1).min(max_stage))
					>
						"Next stage"
					</button>
					<button on:click=move |_| {
						stage.set(0);
						replay.update(|n| *n += 1);
					}>"Replay"</button>
					<label>
						<input
							type="checkbox"
							prop:checked=move || mode.get() == AnimationMode::Staged
							on:change=move |_| {
								mode.update(|m| {
									*m = match m {
										AnimationMode::Staged => AnimationMode::Continuous,
										AnimationMode::Continuous => AnimationMode::Staged,
									}
								})
							}
						/>
						" Staged"
					</label>
					<label>
						<input
							type="checkbox"
							prop:checked=move || auto_advance.get()
							on:change=move |_| auto_advance.update(|a| *a = !*a)
						/>
						" Auto-advance"
					</label>
				</div>
				<p class="status">{status}</p>
			</div>
		</div>
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	match GraphDocument::from_json(SAMPLE_DOCUMENT) {
		Ok(document) => view! { <ConstellationDemo document=document /> }.into_any(),
		Err(err) => {
			error!("home: {}", err);
			view! {
				<div class="load-error">
					<h1>"Uh oh! The graph could not be loaded."</h1>
					<p>{err.to_string()}</p>
				</div>
			}
			.into_any()
		}
	}
}
