use std::cell::RefCell;
use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use glam::Vec3;

use crate::display::EventHandler;
use crate::input::{MouseButton, MouseButtonEvent, MouseButtonState, MousePositionEvent, ScrollEvent};

use super::View3D;

/// Radians of rotation per pixel of drag.
const ROTATE_SPEED: f32 = 0.005;
/// Elevation stays one degree short of the poles so `up` never aligns with
/// the viewing direction.
const MAX_ELEVATION: f32 = FRAC_PI_2 - 0.017_453_3;
const MIN_DISTANCE: f32 = 1e-3;

/// Orbits a [`View3D`] around a target point.
///
/// Dragging with the left button rotates around the world +Z axis and tilts
/// the elevation; scrolling moves the camera toward or away from the target.
pub struct OrbitController {
    view: Rc<RefCell<View3D>>,
    target: Vec3,
    distance: f32,
    azimuth: f32,
    elevation: f32,
    dragging: bool,
    last_position: Option<(f32, f32)>,
}

impl OrbitController {
    /// Starts from the view's current position relative to `target`.
    pub fn new(view: Rc<RefCell<View3D>>, target: Vec3) -> Self {
        let offset = view.borrow().pose().translation - target;
        let distance = offset.length().max(MIN_DISTANCE);
        let azimuth = offset.y.atan2(offset.x);
        let elevation = (offset.z / distance).clamp(-1.0, 1.0).asin();

        let mut controller = Self {
            view,
            target,
            distance,
            azimuth,
            elevation: elevation.clamp(-MAX_ELEVATION, MAX_ELEVATION),
            dragging: false,
            last_position: None,
        };
        controller.update();
        controller
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.update();
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.max(MIN_DISTANCE);
        self.update();
    }

    pub fn angles(&self) -> (f32, f32) {
        (self.azimuth, self.elevation)
    }

    fn update(&mut self) {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        let offset = Vec3::new(cos_el * cos_az, cos_el * sin_az, sin_el) * self.distance;
        self.view
            .borrow_mut()
            .look_at(self.target, self.target + offset, Vec3::Z);
    }
}

impl EventHandler for OrbitController {
    fn mouse_button_event(&mut self, event: &MouseButtonEvent) {
        if event.button == MouseButton::Left {
            self.dragging = event.state == MouseButtonState::Pressed;
        }
    }

    fn mouse_position_event(&mut self, event: &MousePositionEvent) {
        if let Some((x, y)) = self.last_position {
            if self.dragging {
                self.azimuth -= (event.x - x) * ROTATE_SPEED;
                self.elevation = (self.elevation + (event.y - y) * ROTATE_SPEED)
                    .clamp(-MAX_ELEVATION, MAX_ELEVATION);
                self.update();
            }
        }
        self.last_position = Some((event.x, event.y));
    }

    fn scroll_event(&mut self, event: &ScrollEvent) {
        // Scrolling up zooms in.
        let zoom = 1.1_f32.powf(-event.dy / ScrollEvent::PIXELS_PER_LINE);
        self.distance = (self.distance * zoom).max(MIN_DISTANCE);
        self.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::view::shared;

    const EPS: f32 = 1e-4;

    fn controller() -> (Rc<RefCell<View3D>>, OrbitController) {
        let view = shared(View3D::pinhole(60.0));
        view.borrow_mut().look_at(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::Z);
        let orbit = OrbitController::new(view.clone(), Vec3::ZERO);
        (view, orbit)
    }

    fn button(state: MouseButtonState) -> MouseButtonEvent {
        MouseButtonEvent {
            button: MouseButton::Left,
            state,
            x: 0.0,
            y: 0.0,
            modifiers: Modifiers::default(),
        }
    }

    #[test]
    fn starts_from_current_position() {
        let (view, orbit) = controller();
        assert!((orbit.distance() - 10.0).abs() < EPS);
        assert!(view.borrow().pose().translation.abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), EPS));
    }

    #[test]
    fn scroll_up_moves_closer() {
        let (view, mut orbit) = controller();
        orbit.scroll_event(&ScrollEvent {
            dx: 0.0,
            dy: ScrollEvent::PIXELS_PER_LINE,
            modifiers: Modifiers::default(),
        });
        assert!(orbit.distance() < 10.0);
        let position = view.borrow().pose().translation;
        assert!((position.length() - orbit.distance()).abs() < EPS);
    }

    #[test]
    fn drag_rotates_only_while_pressed() {
        let (_view, mut orbit) = controller();
        let start = orbit.angles();

        orbit.mouse_position_event(&MousePositionEvent { x: 0.0, y: 0.0 });
        orbit.mouse_position_event(&MousePositionEvent { x: 50.0, y: 0.0 });
        assert_eq!(orbit.angles(), start);

        orbit.mouse_button_event(&button(MouseButtonState::Pressed));
        orbit.mouse_position_event(&MousePositionEvent { x: 100.0, y: 0.0 });
        assert!((orbit.angles().0 - (start.0 - 50.0 * ROTATE_SPEED)).abs() < EPS);

        orbit.mouse_button_event(&button(MouseButtonState::Released));
        orbit.mouse_position_event(&MousePositionEvent { x: 200.0, y: 0.0 });
        assert!((orbit.angles().0 - (start.0 - 50.0 * ROTATE_SPEED)).abs() < EPS);
    }

    #[test]
    fn elevation_is_clamped_short_of_the_pole() {
        let (view, mut orbit) = controller();
        orbit.mouse_button_event(&button(MouseButtonState::Pressed));
        orbit.mouse_position_event(&MousePositionEvent { x: 0.0, y: 0.0 });
        orbit.mouse_position_event(&MousePositionEvent { x: 0.0, y: 10_000.0 });

        assert!((orbit.angles().1 - MAX_ELEVATION).abs() < EPS);
        let forward = view.borrow().pose().y_axis();
        assert!(forward.is_finite());
    }
}
