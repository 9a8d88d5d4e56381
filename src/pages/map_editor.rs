use leptos::prelude::*;

use crate::components::map_editor::MapEditorLines;

/// Connector line editor playground.
#[component]
pub fn MapEditor() -> impl IntoView {
	view! {
		<div class="map-editor-page">
			<h1>"Map editor: lines"</h1>
			<p class="subtitle">
				"Draw from a shape and hover another for half a second to connect. Esc cancels. Switch to Select to drag shapes or the middle of an elbow line."
			</p>
			<MapEditorLines />
		</div>
	}
}
