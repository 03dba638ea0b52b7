//! Formatter options.
//!
//! One [`FormatConfig`] is built per format call and passed down explicitly. Deserializing a
//! partial JSON object fills every missing field from [`FormatConfig::default`].

use knotwork_graph::{PinDirection, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormattingStyle {
    /// Branches that would share space along the flow axis are pushed apart.
    #[default]
    Expanded,
    Compact,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    /// Pure dependencies are stacked below and to the left of their consumer.
    #[default]
    Helixing,
    /// Pure dependencies are laid out in columns to the left of their consumer.
    LeftSide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WiringStyle {
    /// One knot track per source pin, shared by all of its targets.
    #[default]
    AlwaysMerge,
    /// One knot track per link.
    SingleWire,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatAllStyle {
    #[default]
    Simple,
    Smart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatConfig {
    /// Gap between exec nodes: `x` between columns, `y` between rows.
    pub padding: Vec2,
    /// Gap between a consumer and its pure dependencies.
    pub parameter_padding: Vec2,
    pub direction: PinDirection,
    pub style: FormattingStyle,
    pub parameter_style: ParameterStyle,
    pub wiring_style: WiringStyle,
    pub center_branches: bool,
    pub min_branches_to_center: usize,
    pub knot_distance_threshold: f64,
    pub create_knots: bool,
    pub knot_track_spacing: f64,
    pub knot_size: Vec2,
    pub snap_to_grid: bool,
    pub grid_size: f64,
    pub apply_comment_padding: bool,
    pub comment_padding: Vec2,
    pub expand_nodes_by_height: bool,
    pub expand_nodes_ahead_of_parameters: bool,
    pub treat_delegates_as_exec: bool,
    pub enable_fast_path: bool,
    pub format_all_padding: Vec2,
    pub format_all_style: FormatAllStyle,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            padding: Vec2::new(100.0, 100.0),
            parameter_padding: Vec2::new(40.0, 25.0),
            direction: PinDirection::Output,
            style: FormattingStyle::Expanded,
            parameter_style: ParameterStyle::Helixing,
            wiring_style: WiringStyle::AlwaysMerge,
            center_branches: false,
            min_branches_to_center: 3,
            knot_distance_threshold: 800.0,
            create_knots: true,
            knot_track_spacing: 26.0,
            knot_size: Vec2::new(42.0, 16.0),
            snap_to_grid: false,
            grid_size: 16.0,
            apply_comment_padding: true,
            comment_padding: Vec2::new(30.0, 30.0),
            expand_nodes_by_height: true,
            expand_nodes_ahead_of_parameters: true,
            treat_delegates_as_exec: true,
            enable_fast_path: false,
            format_all_padding: Vec2::new(600.0, 200.0),
            format_all_style: FormatAllStyle::Simple,
        }
    }
}

impl FormatConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Spacing kept between a pin and the top of a branch hanging below it.
    pub fn vertical_pin_spacing(&self) -> f64 {
        self.knot_track_spacing
    }
}
