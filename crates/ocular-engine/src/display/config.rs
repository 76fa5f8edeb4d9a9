use crate::coords::Color;

/// Window and frame settings of a display.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub title: String,
    /// Initial inner size in logical pixels.
    pub width: f64,
    pub height: f64,
    pub clear_color: Color,
    /// Log the frame rate once per second.
    pub frame_counter: bool,
    /// Frame rate cap on top of the present mode's own pacing.
    pub max_fps: Option<f32>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "ocular".to_string(),
            width: 1280.0,
            height: 720.0,
            clear_color: Color::BLACK,
            frame_counter: false,
            max_fps: None,
        }
    }
}
