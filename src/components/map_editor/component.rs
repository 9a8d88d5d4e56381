use std::time::Duration;

use leptos::ev;
use leptos::leptos_dom::helpers::TimeoutHandle;
use leptos::prelude::*;
use log::warn;
use send_wrapper::SendWrapper;
use web_sys::{KeyboardEvent, MouseEvent};

use super::editor::{LineEditor, SMART_CONFIRM_MS, SmartTimer};
use super::geometry::{Point, Shape};
use super::path::LineType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tool {
	Draw,
	Select,
}

fn demo_shapes() -> Vec<Shape> {
	vec![
		Shape::new("intro", 60.0, 60.0, 140.0, 70.0),
		Shape::new("practice", 360.0, 90.0, 140.0, 70.0),
		Shape::new("review", 180.0, 300.0, 140.0, 70.0),
		Shape::new("project", 520.0, 330.0, 140.0, 70.0),
	]
}

/// SVG editor for connector lines between draggable shapes.
#[component]
pub fn MapEditorLines(
	#[prop(optional)] shapes: Option<Vec<Shape>>,
	#[prop(default = 800.0)] width: f64,
	#[prop(default = 500.0)] height: f64,
) -> impl IntoView {
	let editor = RwSignal::new(LineEditor::new(shapes.unwrap_or_else(demo_shapes)));
	let tool = RwSignal::new(Tool::Draw);
	let line_type = RwSignal::new(LineType::Elbow);
	let smart_timer = StoredValue::new(None::<TimeoutHandle>);
	let surface_ref = NodeRef::<leptos::html::Div>::new();

	let clear_timer = move || {
		if let Some(handle) = smart_timer.get_value() {
			handle.clear();
		}
		smart_timer.set_value(None);
	};

	let arm_timer = move || {
		clear_timer();
		let confirm = move || {
			smart_timer.set_value(None);
			editor.update(|e| {
				e.poll(js_sys::Date::now());
			});
		};
		match set_timeout_with_handle(confirm, Duration::from_millis(SMART_CONFIRM_MS as u64)) {
			Ok(handle) => smart_timer.set_value(Some(handle)),
			Err(err) => warn!("map editor: could not schedule smart connection: {:?}", err),
		}
	};

	let point_of = move |ev: &MouseEvent| -> Option<Point> {
		let rect = surface_ref.get()?.get_bounding_client_rect();
		Some(Point::new(
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		))
	};

	let on_mousedown = move |ev: MouseEvent| {
		let Some(p) = point_of(&ev) else {
			return;
		};
		match tool.get_untracked() {
			Tool::Draw => editor.update(|e| e.begin_line(p, line_type.get_untracked())),
			Tool::Select => editor.update(|e| {
				e.begin_drag(p);
			}),
		}
	};

	let on_mousemove = move |ev: MouseEvent| {
		let Some(p) = point_of(&ev) else {
			return;
		};
		if editor.with_untracked(|e| e.draft().is_some()) {
			let timer = editor
				.try_update(|e| e.update_draft(p, js_sys::Date::now()))
				.unwrap_or(SmartTimer::Unchanged);
			match timer {
				SmartTimer::Started => arm_timer(),
				SmartTimer::Cancelled => clear_timer(),
				SmartTimer::Unchanged => {}
			}
		} else if editor.with_untracked(|e| e.is_dragging()) {
			editor.update(|e| {
				if let Err(err) = e.drag_to(p) {
					warn!("map editor: {}", err);
				}
			});
		}
	};

	let on_mouseup = move |_: MouseEvent| {
		clear_timer();
		editor.update(|e| {
			if e.draft().is_some() {
				e.finish_line();
			}
			e.end_drag();
		});
	};

	let keydown = window_event_listener(ev::keydown, move |ev: KeyboardEvent| {
		if ev.key() == "Escape" {
			clear_timer();
			editor.update(|e| e.cancel_line());
		}
	});
	let keydown = SendWrapper::new(keydown);
	on_cleanup(move || {
		keydown.take().remove();
		clear_timer();
	});

	let shapes_view = move || {
		editor.with(|e| {
			let (hovered, pending) = (e.hovered_shape_id(), e.pending_shape_id());
			e.shapes()
				.iter()
				.map(|s| {
					let class = if hovered == Some(s.id.as_str()) {
						"map-shape smart-target"
					} else if pending == Some(s.id.as_str()) {
						"map-shape smart-pending"
					} else {
						"map-shape"
					};
					let center = s.center();
					view! {
						<g class=class>
							<rect
								x=s.x.to_string()
								y=s.y.to_string()
								width=s.width.to_string()
								height=s.height.to_string()
								rx="6"
							/>
							<text x=center.x.to_string() y=center.y.to_string() text-anchor="middle" dominant-baseline="middle">
								{s.id.clone()}
							</text>
						</g>
					}
				})
				.collect_view()
		})
	};

	let lines_view = move || {
		editor.with(|e| {
			e.lines()
				.iter()
				.map(|line| {
					let handles = line
						.path
						.segments()
						.into_iter()
						.filter(|s| s.draggable)
						.map(|s| {
							let m = s.midpoint();
							view! { <circle class="segment-handle" cx=m.x.to_string() cy=m.y.to_string() r="4" /> }
						})
						.collect_view();
					view! {
						<g class="map-line">
							<path d=line.path.to_svg() fill="none" />
							{handles}
						</g>
					}
				})
				.collect_view()
		})
	};

	let draft_view = move || {
		editor.with(|e| {
			e.draft_path()
				.map(|path| view! { <path class="map-line draft" d=path.to_svg() fill="none" /> })
		})
	};

	let line_type_button = move |value: LineType, label: &'static str| {
		view! {
			<button
				class:active=move || line_type.get() == value
				on:click=move |_| line_type.set(value)
			>
				{label}
			</button>
		}
	};

	view! {
		<div class="map-editor-lines">
			<div class="map-editor-toolbar">
				<button class:active=move || tool.get() == Tool::Draw on:click=move |_| tool.set(Tool::Draw)>
					"Draw"
				</button>
				<button class:active=move || tool.get() == Tool::Select on:click=move |_| tool.set(Tool::Select)>
					"Select"
				</button>
				{line_type_button(LineType::Straight, "Straight")}
				{line_type_button(LineType::Elbow, "Elbow")}
				{line_type_button(LineType::Curved, "Curved")}
			</div>
			<div
				node_ref=surface_ref
				class="map-editor-surface"
				style=format!("width: {}px; height: {}px;", width, height)
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
			>
				<svg width=width.to_string() height=height.to_string()>
					{shapes_view}
					{lines_view}
					{draft_view}
				</svg>
			</div>
		</div>
	}
}
