use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use leptos::prelude::*;
use log::info;
use send_wrapper::SendWrapper;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::config::{AnimationMode, ConstellationConfig, DisplaySettings, LayoutParams};
use super::interaction::NodeDetail;
use super::render;
use super::session::SessionEvent;
use super::state::ConstellationState;
use super::types::GraphDocument;

/// Fixed frame step fed to the session, in seconds.
const FRAME_SECONDS: f64 = 0.016;

type SharedState = Rc<RefCell<Option<ConstellationState>>>;
type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Window listeners that only exist while a node is being dragged.
struct DragListeners {
	on_move: Closure<dyn FnMut(MouseEvent)>,
	on_up: Closure<dyn FnMut(MouseEvent)>,
}

impl DragListeners {
	fn attach(&self, window: &Window) {
		let _ = window
			.add_event_listener_with_callback("mousemove", self.on_move.as_ref().unchecked_ref());
		let _ =
			window.add_event_listener_with_callback("mouseup", self.on_up.as_ref().unchecked_ref());
	}

	fn detach(&self, window: &Window) {
		let _ = window.remove_event_listener_with_callback(
			"mousemove",
			self.on_move.as_ref().unchecked_ref(),
		);
		let _ = window
			.remove_event_listener_with_callback("mouseup", self.on_up.as_ref().unchecked_ref());
	}
}

/// Empty a shared slot, letting `finish` see the value before it drops.
fn release_slot<T>(slot: &RefCell<Option<T>>, finish: impl FnOnce(&T)) {
	let value = slot.borrow_mut().take();
	if let Some(value) = value {
		finish(&value);
	}
}

fn canvas_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

#[component]
pub fn GraphConstellation(
	document: GraphDocument,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
	#[prop(default = true)] animated: bool,
	#[prop(default = 3000.0)] animation_duration: f64,
	#[prop(default = AnimationMode::Continuous)] animation_mode: AnimationMode,
	#[prop(into, optional)] current_stage: Option<Signal<usize>>,
	#[prop(default = 2000.0)] stage_duration: f64,
	#[prop(default = false)] auto_advance_stages: bool,
	#[prop(optional)] on_stage_complete: Option<Callback<usize>>,
	#[prop(optional)] on_animation_complete: Option<Callback<()>>,
	#[prop(optional)] initial_settings: Option<DisplaySettings>,
	#[prop(into, optional)] replay: Option<Signal<u32>>,
) -> impl IntoView {
	let document = Rc::new(document);
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let settings = RwSignal::new(initial_settings.unwrap_or_default());
	let (selected, set_selected) = signal(None::<NodeDetail>);

	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: FrameCallback = Rc::new(RefCell::new(None));
	let frame_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
	let listeners: Rc<RefCell<Option<DragListeners>>> = Rc::new(RefCell::new(None));
	let resize_cb: FrameCallback = Rc::new(RefCell::new(None));

	let dispatch = move |events: Vec<SessionEvent>| {
		for event in events {
			match event {
				SessionEvent::StageComplete(stage) => {
					if let Some(cb) = on_stage_complete {
						cb.run(stage);
					}
				}
				SessionEvent::AnimationComplete => {
					if let Some(cb) = on_animation_complete {
						cb.run(());
					}
				}
			}
		}
	};
	let host_stage = move || current_stage.map(|s| s.get_untracked()).unwrap_or(0);

	// Drag listeners are created once and only (de)registered per drag, so a
	// closure is never dropped while it runs. `on_up` reaches its own slot
	// weakly; cleanup empties the slot.
	{
		let (state_mv, state_up) = (state.clone(), state.clone());
		let listeners_up: Weak<RefCell<Option<DragListeners>>> = Rc::downgrade(&listeners);
		let on_move = Closure::<dyn FnMut(MouseEvent)>::new(move |ev: MouseEvent| {
			let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
				return;
			};
			if let Some(ref mut s) = *state_mv.borrow_mut() {
				s.pointer_move(x, y);
			}
		});
		let on_up = Closure::<dyn FnMut(MouseEvent)>::new(move |_: MouseEvent| {
			if let Some(ref mut s) = *state_up.borrow_mut() {
				s.pointer_up();
				set_selected.set(s.selected.clone());
			}
			let (Some(window), Some(slot)) = (web_sys::window(), listeners_up.upgrade()) else {
				return;
			};
			if let Some(l) = slot.borrow().as_ref() {
				l.detach(&window);
			}
		});
		*listeners.borrow_mut() = Some(DragListeners { on_move, on_up });
	}

	let (state_init, animate_init, frame_init) = (state.clone(), animate.clone(), frame_id.clone());
	let (document_init, resize_init) = (document.clone(), resize_cb.clone());
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let viewport = |win: &Window| {
			(
				win.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0),
				win.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0),
			)
		};
		let (w, h) = if fullscreen {
			viewport(&window)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			return;
		};

		let config = ConstellationConfig {
			width: w,
			height: h,
			animated,
			animation_duration,
			animation_mode,
			stage_duration,
			auto_advance_stages,
			initial_settings: settings.get_untracked(),
			layout: LayoutParams::default(),
		};
		let mut constellation = ConstellationState::new(document_init.clone(), config);
		let events = constellation.start(host_stage());
		*state_init.borrow_mut() = Some(constellation);
		dispatch(events);
		info!("constellation: mounted {}x{}", w, h);

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = viewport(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_init.borrow() {
				let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner, frame_inner) =
			(state_init.clone(), animate_init.clone(), frame_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let events = match *state_anim.borrow_mut() {
				Some(ref mut s) => {
					s.settings = settings.get_untracked();
					let events = s.tick(FRAME_SECONDS);
					render::render(s, &ctx);
					events
				}
				None => Vec::new(),
			};
			dispatch(events);
			if let (Some(cb), Some(win)) = (animate_inner.borrow().as_ref(), web_sys::window()) {
				frame_inner.set(win.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			frame_init.set(window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
		}
	});

	if let Some(stage) = current_stage {
		let state_stage = state.clone();
		Effect::new(move |_| {
			let stage = stage.get();
			let events = state_stage
				.borrow_mut()
				.as_mut()
				.map(|s| s.sync_stage(stage))
				.unwrap_or_default();
			dispatch(events);
		});
	}

	// external replay signal and the overlay button both bump a counter;
	// a replay resumes at the host's current stage
	let replay_requests = RwSignal::new(0u32);
	let state_replay = state.clone();
	Effect::new(move |prev: Option<(u32, u32)>| {
		let requested = (replay.map(|r| r.get()).unwrap_or(0), replay_requests.get());
		if prev.is_some_and(|p| p != requested) {
			let events = state_replay
				.borrow_mut()
				.as_mut()
				.map(|s| s.replay(host_stage()))
				.unwrap_or_default();
			set_selected.set(None);
			dispatch(events);
		}
		requested
	});

	// closing the panel from the overlay clears the canvas selection too
	let state_sel = state.clone();
	Effect::new(move |_| {
		if selected.get().is_none() {
			if let Some(ref mut s) = *state_sel.borrow_mut() {
				s.select(None);
			}
		}
	});

	let teardown = SendWrapper::new((
		state.clone(),
		animate.clone(),
		frame_id.clone(),
		listeners.clone(),
		resize_cb.clone(),
	));
	on_cleanup(move || {
		let (state, animate, frame_id, listeners, resize_cb) = teardown.take();
		if let Some(window) = web_sys::window() {
			if let Some(id) = frame_id.take() {
				let _ = window.cancel_animation_frame(id);
			}
			release_slot(&listeners, |l| l.detach(&window));
			release_slot(&resize_cb, |cb| {
				let _ = window.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			});
		}
		listeners.borrow_mut().take();
		resize_cb.borrow_mut().take();
		animate.borrow_mut().take();
		if let Some(ref mut s) = *state.borrow_mut() {
			s.dispose();
		}
		info!("constellation: unmounted");
	});

	let (state_md, listeners_md) = (state.clone(), listeners.clone());
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		let dragging = match *state_md.borrow_mut() {
			Some(ref mut s) => s.pointer_down(x, y),
			None => false,
		};
		if dragging {
			if let (Some(window), Some(l)) = (web_sys::window(), listeners_md.borrow().as_ref()) {
				l.attach(&window);
			}
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_mm.borrow_mut() {
			// window listeners own the drag
			if !s.drag.active() {
				s.pointer_move(x, y);
			}
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_mu.borrow_mut() {
			if !s.drag.active() {
				s.pointer_up();
				set_selected.set(s.selected.clone());
			}
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			s.pointer_leave();
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			s.zoom(x, y, ev.delta_y());
		}
	};

	let controls = move || {
		settings.get().show_controls.then(|| {
			view! {
				<div class="constellation-controls">
					<label>
						<input
							type="checkbox"
							prop:checked=move || settings.get().show_node_labels
							on:change=move |_| settings.update(|s| s.show_node_labels = !s.show_node_labels)
						/>
						" Node labels"
					</label>
					<label>
						<input
							type="checkbox"
							prop:checked=move || settings.get().show_edge_labels
							on:change=move |_| settings.update(|s| s.show_edge_labels = !s.show_edge_labels)
						/>
						" Edge labels"
					</label>
					<button on:click=move |_| replay_requests.update(|n| *n += 1)>"Replay"</button>
				</div>
			}
		})
	};

	let detail = move || {
		selected.get().map(|d| {
			view! {
				<div class="constellation-detail">
					<h3>{d.label}</h3>
					<p class="constellation-detail-type">{d.node_type}</p>
					<dl>
						{d
							.properties
							.into_iter()
							.map(|(key, value)| view! { <dt>{key}</dt><dd>{value}</dd> })
							.collect_view()}
					</dl>
					<button on:click=move |_| set_selected.set(None)>"Close"</button>
				</div>
			}
		})
	};

	view! {
		<div class="graph-constellation" style="position: relative;">
			<canvas
				node_ref=canvas_ref
				class="graph-constellation-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>
			{controls}
			{detail}
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Handlers {
		state: Rc<RefCell<u32>>,
		slot: Weak<RefCell<Option<Handlers>>>,
	}

	#[test]
	fn releasing_the_slot_frees_what_its_handlers_captured() {
		let state = Rc::new(RefCell::new(0));
		let slot: Rc<RefCell<Option<Handlers>>> = Rc::new(RefCell::new(None));
		*slot.borrow_mut() = Some(Handlers {
			state: state.clone(),
			slot: Rc::downgrade(&slot),
		});
		assert_eq!(Rc::strong_count(&state), 2);

		let mut detached = false;
		release_slot(&slot, |h| {
			assert!(h.slot.upgrade().is_some());
			*h.state.borrow_mut() += 1;
			detached = true;
		});
		assert!(detached);
		assert!(slot.borrow().is_none());
		assert_eq!(*state.borrow(), 1);
		assert_eq!(Rc::strong_count(&state), 1);
		assert_eq!(Rc::strong_count(&slot), 1);
	}

	#[test]
	fn releasing_an_empty_slot_skips_finish() {
		let slot: RefCell<Option<u32>> = RefCell::new(None);
		release_slot(&slot, |_| panic!("nothing to release"));
	}
}
