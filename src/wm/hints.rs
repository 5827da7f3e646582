//! Hints Module
//!
//! ICCCM size hints (`WM_NORMAL_HINTS`) and WM hints (`WM_HINTS`), and the
//! size-constraint pass legacy clients depend on.

// WM_SIZE_HINTS flag bits
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_ASPECT: u32 = 1 << 7;
const P_BASE_SIZE: u32 = 1 << 8;

// WM_HINTS flag bits
const INPUT_HINT: u32 = 1 << 0;
const URGENCY_HINT: u32 = 1 << 8;

/// Size-constraint descriptor
///
/// Zero means unconstrained for every field; aspect bounds are width/height
/// ratios.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizeHints {
    pub base_width: u32,
    pub base_height: u32,
    pub width_inc: u32,
    pub height_inc: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl SizeHints {
    /// Decode the 18-word `WM_NORMAL_HINTS` property.
    ///
    /// A missing base size falls back to the min size and vice versa.
    pub fn from_normal_hints(values: &[u32]) -> Self {
        if values.len() < 18 {
            return Self::default();
        }
        let flags = values[0];
        let mut hints = Self::default();

        if flags & P_BASE_SIZE != 0 {
            hints.base_width = values[15];
            hints.base_height = values[16];
        } else if flags & P_MIN_SIZE != 0 {
            hints.base_width = values[5];
            hints.base_height = values[6];
        }

        if flags & P_RESIZE_INC != 0 {
            hints.width_inc = values[9];
            hints.height_inc = values[10];
        }

        if flags & P_MAX_SIZE != 0 {
            hints.max_width = values[7];
            hints.max_height = values[8];
        }

        if flags & P_MIN_SIZE != 0 {
            hints.min_width = values[5];
            hints.min_height = values[6];
        } else if flags & P_BASE_SIZE != 0 {
            hints.min_width = values[15];
            hints.min_height = values[16];
        }

        if flags & P_ASPECT != 0 {
            let (min_num, min_den) = (values[11], values[12]);
            let (max_num, max_den) = (values[13], values[14]);
            if min_den != 0 && max_den != 0 {
                hints.min_aspect = min_num as f64 / min_den as f64;
                hints.max_aspect = max_num as f64 / max_den as f64;
            }
        }

        hints
    }

    /// ICCCM-fixed: the client cannot be resized at all.
    pub fn is_fixed(&self) -> bool {
        self.max_width != 0
            && self.max_height != 0
            && self.max_width == self.min_width
            && self.max_height == self.min_height
    }

    /// Constrain a content size.
    ///
    /// The order of operations matches what legacy clients (terminals in
    /// particular) expect: base removal, aspect, increments, then min/max with
    /// the min bound winning over the max bound.
    pub fn apply(&self, width: u32, height: u32) -> (u32, u32) {
        let mut w = width as i64;
        let mut h = height as i64;
        let base_w = self.base_width as i64;
        let base_h = self.base_height as i64;
        let base_is_min = self.base_width == self.min_width && self.base_height == self.min_height;

        if !base_is_min {
            w -= base_w;
            h -= base_h;
        }

        if self.min_aspect > 0.0 && self.max_aspect > 0.0 && w > 0 && h > 0 {
            let ratio = w as f64 / h as f64;
            if ratio > self.max_aspect {
                w = (h as f64 * self.max_aspect).round() as i64;
            } else if ratio < self.min_aspect {
                h = (w as f64 / self.min_aspect).round() as i64;
            }
        }

        if self.width_inc > 0 || self.height_inc > 0 {
            if base_is_min {
                w -= base_w;
                h -= base_h;
            }
            if self.width_inc > 0 && w > 0 {
                w -= w % self.width_inc as i64;
            }
            if self.height_inc > 0 && h > 0 {
                h -= h % self.height_inc as i64;
            }
            // truncation can push the ratio back out of bounds
            if self.min_aspect > 0.0 && self.max_aspect > 0.0 {
                let (wi, hi) = (self.width_inc as i64, self.height_inc as i64);
                while wi > 0 && w > wi && h > 0 && w as f64 / h as f64 > self.max_aspect {
                    w -= wi;
                }
                while hi > 0 && h > hi && w > 0 && (w as f64 / h as f64) < self.min_aspect {
                    h -= hi;
                }
            }
            w += base_w;
            h += base_h;
        } else if !base_is_min {
            w += base_w;
            h += base_h;
        }

        if self.max_width > 0 {
            w = w.min(aligned_max(self.max_width, self.base_width, self.width_inc));
        }
        if self.max_height > 0 {
            h = h.min(aligned_max(self.max_height, self.base_height, self.height_inc));
        }
        w = w.max(self.min_width as i64).max(1);
        h = h.max(self.min_height as i64).max(1);

        (w.min(u32::MAX as i64) as u32, h.min(u32::MAX as i64) as u32)
    }
}

/// Largest size not above `max` that sits on the increment grid, so a
/// clamped size survives another pass unchanged.
fn aligned_max(max: u32, base: u32, inc: u32) -> i64 {
    let (max, base, inc) = (max as i64, base as i64, inc as i64);
    if inc == 0 || max <= base {
        return max;
    }
    max - (max - base) % inc
}

/// WM hints (XWMHints subset the core interprets)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    pub input: bool,
    pub urgent: bool,
}

impl Default for WmHints {
    fn default() -> Self {
        // ICCCM: a client that sets no input hint is assumed to want focus
        Self { input: true, urgent: false }
    }
}

impl WmHints {
    pub fn from_raw(values: &[u32]) -> Self {
        let Some(&flags) = values.first() else {
            return Self::default();
        };
        let input = if flags & INPUT_HINT != 0 {
            values.get(1).map(|v| *v != 0).unwrap_or(true)
        } else {
            true
        };
        Self {
            input,
            urgent: flags & URGENCY_HINT != 0,
        }
    }
}

/// `WM_HINTS` words with the urgency flag dropped, or `None` when the flag
/// is not set.
pub fn clear_urgency(values: &[u32]) -> Option<Vec<u32>> {
    let flags = *values.first()?;
    if flags & URGENCY_HINT == 0 {
        return None;
    }
    let mut cleared = values.to_vec();
    cleared[0] = flags & !URGENCY_HINT;
    Some(cleared)
}
