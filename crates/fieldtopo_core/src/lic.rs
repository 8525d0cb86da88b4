//! White-noise textures and line integral convolution.
//!
//! LIC runs in texture pixel space. [`TextureSpace`] rescales the flow so
//! that streamlines traced on it advance in pixels, and the noise texture can
//! be sampled directly at the traced positions.

use crate::grid::ScalarGrid;
use crate::interpolation::sample_scalar;
use crate::settings::{check_count, check_range};
use crate::streamline::{trace_bidirectional, TraceSettings, STAGNATION_THRESHOLD};
use crate::traits::{GridValue, VectorField};
use crate::types::{Position, Velocity};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub width: usize,
    pub height: usize,
    /// Threshold every texel to pure black or white.
    pub black_white: bool,
    pub seed: u64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            black_white: false,
            seed: 1,
        }
    }
}

impl NoiseSettings {
    pub fn validate(&self) -> Result<()> {
        check_count("width", self.width, 2, 2048)?;
        check_count("height", self.height, 2, 2048)?;
        Ok(())
    }
}

/// Uniform random gray values, reproducible for a given seed.
pub fn generate_noise(settings: &NoiseSettings) -> Result<ScalarGrid<u8>> {
    settings.validate()?;
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let data = (0..settings.width * settings.height)
        .map(|_| {
            let value: u8 = rng.random();
            if settings.black_white {
                if value > 127 {
                    255
                } else {
                    0
                }
            } else {
                value
            }
        })
        .collect();
    Ok(ScalarGrid::new(settings.width, settings.height, data)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicMode {
    /// One short streamline per pixel.
    #[default]
    Basic,
    /// One long streamline per unvisited pixel, reused for every pixel it crosses.
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastSettings {
    /// Target mean of the non-black pixels, in `[0, 1]`.
    pub mean: f64,
    /// Target standard deviation, in `[0, 1]`.
    pub std_dev: f64,
}

impl Default for ContrastSettings {
    fn default() -> Self {
        Self {
            mean: 0.5,
            std_dev: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicSettings {
    pub mode: LicMode,
    /// Box filter half width, in samples along the streamline.
    pub kernel_half_length: usize,
    /// Step length in pixels.
    pub step_size: f64,
    /// Steps per direction for the long streamlines of [`LicMode::Fast`].
    pub max_steps: usize,
    pub normalized: bool,
    pub contrast: Option<ContrastSettings>,
}

impl Default for LicSettings {
    fn default() -> Self {
        Self {
            mode: LicMode::Basic,
            kernel_half_length: 10,
            step_size: 1.0,
            max_steps: 200,
            normalized: true,
            contrast: None,
        }
    }
}

impl LicSettings {
    pub fn validate(&self) -> Result<()> {
        check_count("kernel_half_length", self.kernel_half_length, 1, 1000)?;
        check_range("step_size", self.step_size, 1e-3, 10.0)?;
        check_count("max_steps", self.max_steps, 1, 100_000)?;
        if let Some(contrast) = &self.contrast {
            check_range("mean", contrast.mean, 0.0, 1.0)?;
            check_range("std_dev", contrast.std_dev, 0.0, 1.0)?;
        }
        Ok(())
    }

    fn trace_settings(&self, max_steps: usize) -> TraceSettings {
        TraceSettings {
            step_size: self.step_size,
            max_steps,
            normalized: self.normalized,
            min_velocity: STAGNATION_THRESHOLD,
            ..TraceSettings::default()
        }
    }
}

/// A field viewed on a texture lattice of different resolution.
pub struct TextureSpace<'a, F: VectorField> {
    field: &'a F,
    dims: (usize, usize),
    scale: (f64, f64),
}

impl<'a, F: VectorField> TextureSpace<'a, F> {
    pub fn new(field: &'a F, dims: (usize, usize)) -> Self {
        let (fw, fh) = field.dims();
        let scale = (
            fw.saturating_sub(1) as f64 / dims.0.saturating_sub(1).max(1) as f64,
            fh.saturating_sub(1) as f64 / dims.1.saturating_sub(1).max(1) as f64,
        );
        Self { field, dims, scale }
    }

    pub fn to_field(&self, pixel: &Position) -> Position {
        Position::new(pixel.x * self.scale.0, pixel.y * self.scale.1)
    }
}

impl<F: VectorField> VectorField for TextureSpace<'_, F> {
    fn dims(&self) -> (usize, usize) {
        self.dims
    }

    fn velocity(&self, position: &Position) -> Velocity {
        let v = self.field.velocity(&self.to_field(position));
        let sx = if self.scale.0 > 0.0 { self.scale.0 } else { 1.0 };
        let sy = if self.scale.1 > 0.0 { self.scale.1 } else { 1.0 };
        Velocity::new(v.x / sx, v.y / sy)
    }
}

fn to_gray(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn nearest_pixel(p: &Position, dims: (usize, usize)) -> (usize, usize) {
    let x = p.x.round().clamp(0.0, (dims.0 - 1) as f64) as usize;
    let y = p.y.round().clamp(0.0, (dims.1 - 1) as f64) as usize;
    (x, y)
}

/// Convolves `noise` along the streamlines of `field`. The output has the
/// dimensions of the noise texture.
pub fn compute_lic<T: GridValue>(
    field: &impl VectorField,
    noise: &ScalarGrid<T>,
    settings: &LicSettings,
) -> Result<ScalarGrid<u8>> {
    settings.validate()?;
    let dims = noise.dims();
    let space = TextureSpace::new(field, dims);
    log::debug!(
        "LIC ({:?}) of a {}x{} field onto a {}x{} texture",
        settings.mode,
        field.dims().0,
        field.dims().1,
        dims.0,
        dims.1
    );

    let pixels = match settings.mode {
        LicMode::Basic => basic_lic(&space, noise, settings),
        LicMode::Fast => fast_lic(&space, noise, settings),
    };
    let image = ScalarGrid::new(dims.0, dims.1, pixels)?;
    Ok(match &settings.contrast {
        Some(contrast) => enhance_contrast(&image, contrast.mean, contrast.std_dev),
        None => image,
    })
}

fn basic_lic<F: VectorField, T: GridValue>(
    space: &TextureSpace<'_, F>,
    noise: &ScalarGrid<T>,
    settings: &LicSettings,
) -> Vec<u8> {
    let (width, height) = noise.dims();
    let trace_settings = settings.trace_settings(settings.kernel_half_length);
    let mut pixels = Vec::with_capacity(width * height);
    for j in 0..height {
        for i in 0..width {
            let seed = Position::new(i as f64, j as f64);
            let (line, _) = trace_bidirectional(space, seed, &trace_settings);
            let sum: f64 = line.iter().map(|p| sample_scalar(noise, p)).sum();
            pixels.push(to_gray(sum / line.len() as f64));
        }
    }
    pixels
}

fn fast_lic<F: VectorField, T: GridValue>(
    space: &TextureSpace<'_, F>,
    noise: &ScalarGrid<T>,
    settings: &LicSettings,
) -> Vec<u8> {
    let (width, height) = noise.dims();
    let half = settings.kernel_half_length;
    let trace_settings = settings.trace_settings(settings.max_steps);
    let mut pixels = vec![0u8; width * height];
    let mut visited = vec![false; width * height];
    let mut streamlines = 0usize;

    for j in 0..height {
        for i in 0..width {
            if visited[j * width + i] {
                continue;
            }
            let seed = Position::new(i as f64, j as f64);
            let (line, _) = trace_bidirectional(space, seed, &trace_settings);
            streamlines += 1;
            let samples: Vec<f64> = line.iter().map(|p| sample_scalar(noise, p)).collect();
            let n = samples.len();

            // Window [lo, hi] around k, slid one sample at a time.
            let mut lo = 0;
            let mut hi = half.min(n - 1);
            let mut sum: f64 = samples[lo..=hi].iter().sum();
            for (k, p) in line.iter().enumerate() {
                if k > 0 {
                    let next_hi = (k + half).min(n - 1);
                    if next_hi > hi {
                        sum += samples[next_hi];
                        hi = next_hi;
                    }
                    let next_lo = k.saturating_sub(half);
                    if next_lo > lo {
                        sum -= samples[lo];
                        lo = next_lo;
                    }
                }
                let (px, py) = nearest_pixel(p, (width, height));
                let index = py * width + px;
                if !visited[index] {
                    pixels[index] = to_gray(sum / (hi - lo + 1) as f64);
                    visited[index] = true;
                }
            }
        }
    }
    log::debug!("Fast LIC traced {streamlines} streamlines for {} pixels", width * height);
    pixels
}

/// Shifts and scales the non-black pixels to `mean` and `std_dev` (both in
/// `[0, 1]` of full range). Black pixels stay black.
pub fn enhance_contrast(image: &ScalarGrid<u8>, mean: f64, std_dev: f64) -> ScalarGrid<u8> {
    let lit: Vec<f64> = image.raw().iter().filter(|&&v| v > 0).map(|&v| v as f64).collect();
    let n = lit.len() as f64;
    if lit.len() < 2 {
        return image.clone();
    }
    let current_mean = lit.iter().sum::<f64>() / n;
    let variance = lit.iter().map(|v| (v - current_mean).powi(2)).sum::<f64>() / (n - 1.0);
    let current_std = variance.sqrt();
    if current_std == 0.0 {
        log::warn!("Contrast enhancement skipped: image has uniform intensity");
        return image.clone();
    }
    let factor = std_dev * 255.0 / current_std;
    let target = mean * 255.0;
    image.map(|v| {
        if v > 0.0 {
            to_gray(target + (v - current_mean) * factor)
        } else {
            0
        }
    })
}
