//! Screen buffer normalization
//!
//! Raw frames are cropped (status bars at the top and bottom), area-resized to a
//! fixed resolution that keeps the engine's 4:3 aspect, and scaled into `[0, 1]`
//! channel-first floats.
//!
//! Area averaging is used for the resize: when shrinking, every source pixel
//! contributes in proportion to its overlap with the destination pixel, so small
//! distant sprites survive instead of falling between sample points.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sim::RawFrame;

/// Resolution, crop and color settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Output width (default: 128)
    pub width: usize,
    /// Output height (default: 96)
    pub height: usize,
    /// Fraction of rows removed from the top (default: 0.05)
    pub crop_top: f32,
    /// Fraction of rows removed from the bottom, where the HUD sits (default: 0.15)
    pub crop_bottom: f32,
    /// Channels the engine delivers, 1 or 3 (default: 3)
    pub input_channels: usize,
    /// Collapse RGB to a single luma channel (default: false)
    pub grayscale: bool,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 96,
            crop_top: 0.05,
            crop_bottom: 0.15,
            input_channels: 3,
            grayscale: false,
        }
    }
}

impl ObservationConfig {
    /// `[channels, height, width]` of every transformed frame
    pub fn output_shape(&self) -> [usize; 3] {
        let channels = if self.grayscale { 1 } else { self.input_channels };
        [channels, self.height, self.width]
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "observation resolution {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if !matches!(self.input_channels, 1 | 3) {
            return Err(Error::InvalidConfig(format!(
                "observation input_channels is {}, expected 1 (GRAY8) or 3 (RGB24)",
                self.input_channels
            )));
        }
        let crops_ok = (0.0..1.0).contains(&self.crop_top)
            && (0.0..1.0).contains(&self.crop_bottom)
            && self.crop_top + self.crop_bottom < 1.0;
        if !crops_ok {
            return Err(Error::InvalidConfig(format!(
                "crop fractions top={} bottom={} must be in [0, 1) and leave rows behind",
                self.crop_top, self.crop_bottom
            )));
        }
        Ok(())
    }
}

/// Normalized observation, channel-first, values in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFrame {
    pub data: Vec<f32>,
    /// `[channels, height, width]`
    pub shape: [usize; 3],
}

impl ObservationFrame {
    /// Value at channel `c`, row `y`, column `x`; `None` outside the frame
    pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
        let [channels, h, w] = self.shape;
        if c >= channels || y >= h || x >= w {
            return None;
        }
        self.data.get((c * h + y) * w + x).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    ChannelFirst,
    ChannelLast,
}

/// Source pixel range and overlap weights for one destination pixel
#[derive(Debug, Clone)]
struct Span {
    start: usize,
    weights: Vec<f32>,
}

/// Converts raw engine frames into fixed-shape [`ObservationFrame`]s
#[derive(Debug, Clone)]
pub struct ObservationTransformer {
    config: ObservationConfig,
}

impl ObservationTransformer {
    pub fn new(config: ObservationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ObservationConfig {
        &self.config
    }

    pub fn output_shape(&self) -> [usize; 3] {
        self.config.output_shape()
    }

    /// Crop, resize and normalize one frame
    pub fn transform(&self, frame: &RawFrame) -> Result<ObservationFrame> {
        let expected = frame.dims.iter().product::<usize>();
        if frame.pixels.len() != expected {
            return Err(Error::FrameShapeMismatch {
                expected,
                actual: frame.pixels.len(),
            });
        }

        let (layout, channels) = detect_layout(frame.dims)?;
        if channels != self.config.input_channels {
            return Err(Error::InvalidConfig(format!(
                "frame has {channels} channel(s) but the transformer expects {}; \
                 set observation.input_channels to match the engine's screen format",
                self.config.input_channels
            )));
        }

        let (src_h, src_w) = match layout {
            Layout::ChannelFirst => (frame.dims[1], frame.dims[2]),
            Layout::ChannelLast => (frame.dims[0], frame.dims[1]),
        };

        let top = (src_h as f32 * self.config.crop_top).floor() as usize;
        let bottom = (src_h as f32 * self.config.crop_bottom).floor() as usize;
        let kept = src_h.saturating_sub(top + bottom);
        if kept == 0 || src_w == 0 {
            return Err(Error::InvalidConfig(format!(
                "cropping {top} + {bottom} rows leaves nothing of a {src_h}x{src_w} frame"
            )));
        }

        let hwc = to_hwc(frame, layout, channels, top, kept, src_w);
        let resized = resize_area(
            &hwc,
            [kept, src_w, channels],
            self.config.height,
            self.config.width,
        );

        let [out_c, out_h, out_w] = self.output_shape();
        let plane = out_h * out_w;
        let mut data = vec![0.0; out_c * plane];

        for y in 0..out_h {
            for x in 0..out_w {
                let px = &resized[(y * out_w + x) * channels..][..channels];
                if self.config.grayscale && channels == 3 {
                    let luma = 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2];
                    data[y * out_w + x] = scale_sample(luma);
                } else {
                    for (c, value) in px.iter().enumerate() {
                        data[c * plane + y * out_w + x] = scale_sample(*value);
                    }
                }
            }
        }

        Ok(ObservationFrame {
            data,
            shape: [out_c, out_h, out_w],
        })
    }
}

#[inline]
fn scale_sample(value: f32) -> f32 {
    (value / 255.0).clamp(0.0, 1.0)
}

/// Channel-last wins when both ends could be a channel axis
fn detect_layout(dims: [usize; 3]) -> Result<(Layout, usize)> {
    if matches!(dims[2], 1 | 3) {
        Ok((Layout::ChannelLast, dims[2]))
    } else if matches!(dims[0], 1 | 3) {
        Ok((Layout::ChannelFirst, dims[0]))
    } else {
        Err(Error::UnsupportedChannels { dims })
    }
}

/// Copy the kept rows into a channel-last float buffer
fn to_hwc(
    frame: &RawFrame,
    layout: Layout,
    channels: usize,
    top: usize,
    rows: usize,
    width: usize,
) -> Vec<f32> {
    let src_h = match layout {
        Layout::ChannelFirst => frame.dims[1],
        Layout::ChannelLast => frame.dims[0],
    };
    let mut out = Vec::with_capacity(rows * width * channels);
    for y in top..top + rows {
        for x in 0..width {
            for c in 0..channels {
                let idx = match layout {
                    Layout::ChannelLast => (y * width + x) * channels + c,
                    Layout::ChannelFirst => (c * src_h + y) * width + x,
                };
                out.push(frame.pixels[idx] as f32);
            }
        }
    }
    out
}

fn area_spans(src: usize, dst: usize) -> Vec<Span> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|i| {
            let lo = i as f64 * scale;
            let hi = (i + 1) as f64 * scale;
            let start = lo.floor() as usize;
            let end = (hi.ceil() as usize).min(src).max(start + 1);
            let weights = (start..end)
                .map(|j| {
                    let overlap = hi.min(j as f64 + 1.0) - lo.max(j as f64);
                    (overlap.max(0.0) / scale) as f32
                })
                .collect();
            Span { start, weights }
        })
        .collect()
}

/// Separable area resize of a channel-last buffer
fn resize_area(src: &[f32], dims: [usize; 3], dst_h: usize, dst_w: usize) -> Vec<f32> {
    let [src_h, src_w, channels] = dims;
    let rows = area_spans(src_h, dst_h);
    let cols = area_spans(src_w, dst_w);

    // Vertical pass: [dst_h, src_w, c]
    let mut vertical = vec![0.0f32; dst_h * src_w * channels];
    for (y, span) in rows.iter().enumerate() {
        for (k, weight) in span.weights.iter().enumerate() {
            let src_row = &src[(span.start + k) * src_w * channels..][..src_w * channels];
            let dst_row = &mut vertical[y * src_w * channels..][..src_w * channels];
            for (d, s) in dst_row.iter_mut().zip(src_row) {
                *d += weight * s;
            }
        }
    }

    // Horizontal pass: [dst_h, dst_w, c]
    let mut out = vec![0.0f32; dst_h * dst_w * channels];
    for y in 0..dst_h {
        for (x, span) in cols.iter().enumerate() {
            for (k, weight) in span.weights.iter().enumerate() {
                let s = (y * src_w + span.start + k) * channels;
                let d = (y * dst_w + x) * channels;
                for c in 0..channels {
                    out[d + c] += weight * vertical[s + c];
                }
            }
        }
    }
    out
}
