//! Software side-view renderer.
//!
//! Projects the scene onto the x/z plane: the cavity as a point cloud with
//! the marking band highlighted, the instrument shaft as a line from the
//! RCM, and the loop rope on top.

use bevy::math::Vec3;
use ligature_core::frame::Frame;

use crate::resources::{Cavity, LoopInstrument, RCM};

const BACKGROUND: [u8; 3] = [18, 20, 28];
const TISSUE_FRONT: [u8; 3] = [196, 160, 150];
const TISSUE_BACK: [u8; 3] = [110, 88, 84];
const MARKING: [u8; 3] = [210, 40, 45];
const SHAFT: [u8; 3] = [190, 190, 200];
const ROPE: [u8; 3] = [70, 170, 240];

/// World window shown in the image: x in [X_MIN, X_MIN + SPAN], z in [Z_MIN, Z_MIN + SPAN].
const X_MIN: f32 = -65.0;
const Z_MIN: f32 = -10.0;
const SPAN: f32 = 130.0;

struct Canvas {
    frame: Frame,
    dot: i64,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        let mut frame = Frame::new(width, height);
        frame.fill(BACKGROUND);
        Self {
            frame,
            dot: i64::from((width.min(height) / 256).max(1)),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn project(&self, p: Vec3) -> (i64, i64) {
        let u = (p.x - X_MIN) / SPAN * self.frame.width() as f32;
        let v = (1.0 - (p.z - Z_MIN) / SPAN) * self.frame.height() as f32;
        (u.floor() as i64, v.floor() as i64)
    }

    fn dot(&mut self, p: Vec3, size: i64, rgb: [u8; 3]) {
        let (cx, cy) = self.project(p);
        let half = size * self.dot / 2;
        for y in cy - half..=cy + half {
            for x in cx - half..=cx + half {
                self.frame.put_pixel(x, y, rgb);
            }
        }
    }

    fn line(&mut self, a: Vec3, b: Vec3, rgb: [u8; 3]) {
        let (ax, ay) = self.project(a);
        let (bx, by) = self.project(b);
        let steps = (bx - ax).abs().max((by - ay).abs()).max(1);
        for i in 0..=steps {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / steps as f32;
            self.dot(a.lerp(b, t), 1, rgb);
        }
    }
}

/// Render the scene to a `width` x `height` RGB frame.
pub fn render_scene(instrument: &LoopInstrument, cavity: &Cavity, width: u32, height: u32) -> Frame {
    let mut canvas = Canvas::new(width, height);

    for (i, p) in cavity.current.iter().enumerate() {
        if cavity.marking_indices.binary_search(&i).is_ok() {
            canvas.dot(*p, 3, MARKING);
        } else {
            let rgb = if p.y < 0.0 { TISSUE_FRONT } else { TISSUE_BACK };
            canvas.dot(*p, 2, rgb);
        }
    }

    canvas.line(RCM, instrument.center(), SHAFT);
    for p in instrument.positions() {
        canvas.dot(p, 3, ROPE);
    }

    canvas.frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_has_requested_size() {
        let frame = render_scene(&LoopInstrument::new(20.0, 60), &Cavity::new(35.0, 8.0), 64, 48);
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.data().len(), 64 * 48 * 3);
    }

    #[test]
    fn render_draws_marking_and_rope() {
        let frame = render_scene(&LoopInstrument::new(20.0, 60), &Cavity::new(35.0, 8.0), 256, 256);
        let pixels: Vec<&[u8]> = frame.data().chunks_exact(3).collect();
        assert!(pixels.iter().any(|px| *px == MARKING));
        assert!(pixels.iter().any(|px| *px == ROPE));
        assert!(pixels.iter().any(|px| *px == BACKGROUND));
    }

    #[test]
    fn render_changes_when_loop_moves() {
        let cavity = Cavity::new(35.0, 8.0);
        let mut instrument = LoopInstrument::new(20.0, 60);
        let before = render_scene(&instrument, &cavity, 128, 128);
        instrument.state[3] = 50.0;
        let after = render_scene(&instrument, &cavity, 128, 128);
        assert_ne!(before, after);
    }
}
