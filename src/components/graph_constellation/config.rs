/// How elements are scheduled for reveal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnimationMode {
	/// One pass over every element using the global order/delay fields.
	#[default]
	Continuous,
	/// Elements are revealed stage by stage.
	Staged,
}

/// UI toggles owned by one component instance. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySettings {
	pub show_node_labels: bool,
	pub show_edge_labels: bool,
	pub show_controls: bool,
}

impl Default for DisplaySettings {
	fn default() -> Self {
		Self {
			show_node_labels: true,
			show_edge_labels: false,
			show_controls: true,
		}
	}
}

/// Physics constants for the layout engine.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutParams {
	pub force_charge: f32,
	pub force_spring: f32,
	pub force_max: f32,
	pub node_speed: f32,
	pub damping_factor: f32,
	pub link_distance: f64,
	pub link_strength: f64,
	pub center_strength: f64,
	pub collide_radius: f64,
	pub alpha_decay: f64,
	pub alpha_min: f64,
}

impl Default for LayoutParams {
	fn default() -> Self {
		Self {
			force_charge: 150.0,
			force_spring: 0.05,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
			link_distance: 90.0,
			link_strength: 0.3,
			center_strength: 0.1,
			collide_radius: 22.0,
			alpha_decay: 0.06,
			alpha_min: 0.001,
		}
	}
}

/// Host-facing configuration of a constellation instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstellationConfig {
	pub width: f64,
	pub height: f64,
	pub animated: bool,
	/// Total reveal window in continuous mode, in milliseconds.
	pub animation_duration: f64,
	pub animation_mode: AnimationMode,
	/// Reveal window of one stage, in milliseconds.
	pub stage_duration: f64,
	pub auto_advance_stages: bool,
	pub initial_settings: DisplaySettings,
	pub layout: LayoutParams,
}

impl Default for ConstellationConfig {
	fn default() -> Self {
		Self {
			width: 800.0,
			height: 600.0,
			animated: true,
			animation_duration: 3000.0,
			animation_mode: AnimationMode::Continuous,
			stage_duration: 2000.0,
			auto_advance_stages: false,
			initial_settings: DisplaySettings::default(),
			layout: LayoutParams::default(),
		}
	}
}
