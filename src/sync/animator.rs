//! Animation time tracking.
//!
//! The default animator renders the latest sampled pose. The motion smoothing
//! animator keeps the two most recent animation frames and interpolates
//! between them with a synthetic render time.

/// Source of the per-frame render interpolation value in `[0, 1]`.
pub trait InterpolationValueProvider {
    fn render_interpolation_value(&self) -> f32;
}

const FRAME_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct AnimationFrameInfo {
    timestamp: f32,
    valid: bool,
}

/// Double buffered animator.
///
/// New frames are written into the `next` slot, which then ping-pongs, so
/// the slot at `next` always holds the earliest frame. Once both slots have
/// been written the render time is re-anchored on every new frame to
/// `earliest - delta`, which keeps it inside (or just before) the window
/// regardless of the frame cadence.
#[derive(Debug, Clone, Default)]
pub struct MotionSmoothingAnimator {
    frames: [AnimationFrameInfo; FRAME_COUNT],
    render_time: f32,
    next_index: usize,
    has_two_valid_frames: bool,
    interpolation_value: f32,
}

impl MotionSmoothingAnimator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn earliest_index(&self) -> usize {
        self.next_index
    }

    #[inline]
    fn latest_index(&self) -> usize {
        1 - self.next_index
    }

    pub fn add_animation_frame_time(&mut self, timestamp: f32, delta_time: f32) {
        self.frames[self.next_index] = AnimationFrameInfo {
            timestamp,
            valid: true,
        };
        self.next_index = 1 - self.next_index;

        if !self.has_two_valid_frames && self.frames[1].valid {
            self.has_two_valid_frames = true;
        }

        if self.has_two_valid_frames {
            self.render_time = self.frames[self.earliest_index()].timestamp - delta_time;
        }
    }

    pub fn update_animation_time(&mut self, delta_time: f32, all_animation_data_valid: bool) {
        if !self.has_two_valid_frames {
            self.interpolation_value = 0.0;
            return;
        }

        self.render_time += delta_time;

        if !all_animation_data_valid {
            // Some renderable only has its latest frame; everyone snaps to it.
            self.interpolation_value = 1.0;
            return;
        }

        let t0 = self.frames[self.earliest_index()].timestamp;
        let t1 = self.frames[self.latest_index()].timestamp;
        self.interpolation_value = inverse_lerp(t0, t1, self.render_time);
    }

    #[must_use]
    pub fn has_two_valid_frames(&self) -> bool {
        self.has_two_valid_frames
    }

    #[must_use]
    pub fn render_time(&self) -> f32 {
        self.render_time
    }

    /// `(earliest, latest)` frame timestamps.
    #[must_use]
    pub fn frame_window(&self) -> (f32, f32) {
        (
            self.frames[self.earliest_index()].timestamp,
            self.frames[self.latest_index()].timestamp,
        )
    }
}

impl InterpolationValueProvider for MotionSmoothingAnimator {
    fn render_interpolation_value(&self) -> f32 {
        self.interpolation_value
    }
}

/// Clamped inverse linear interpolation; an empty range yields 0.
fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        return 0.0;
    }
    ((value - a) / (b - a)).clamp(0.0, 1.0)
}

/// Per-entity animator selected from the settings.
#[derive(Debug, Clone)]
pub enum EntityAnimator {
    Default,
    MotionSmoothing(MotionSmoothingAnimator),
}

impl EntityAnimator {
    #[must_use]
    pub fn new(motion_smoothing: bool) -> Self {
        if motion_smoothing {
            Self::MotionSmoothing(MotionSmoothingAnimator::new())
        } else {
            Self::Default
        }
    }

    /// Records the timestamp of a freshly sampled animation frame.
    pub fn add_animation_frame(&mut self, timestamp: f32, delta_time: f32) {
        if let Self::MotionSmoothing(animator) = self {
            animator.add_animation_frame_time(timestamp, delta_time);
        }
    }

    pub fn update_animation_time(&mut self, delta_time: f32, all_animation_data_valid: bool) {
        if let Self::MotionSmoothing(animator) = self {
            animator.update_animation_time(delta_time, all_animation_data_valid);
        }
    }

    #[must_use]
    pub fn is_motion_smoothing(&self) -> bool {
        matches!(self, Self::MotionSmoothing(_))
    }

    /// Frames a renderable needs before it can be interpolated.
    #[must_use]
    pub fn required_animation_frames(&self) -> u32 {
        match self {
            Self::Default => 1,
            Self::MotionSmoothing(_) => FRAME_COUNT as u32,
        }
    }
}

impl InterpolationValueProvider for EntityAnimator {
    /// The default animator always shows its latest frame.
    fn render_interpolation_value(&self) -> f32 {
        match self {
            Self::Default => 1.0,
            Self::MotionSmoothing(animator) => animator.render_interpolation_value(),
        }
    }
}
