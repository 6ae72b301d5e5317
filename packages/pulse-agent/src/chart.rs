//! Minimal PNG charts for pipeline answers. Charts carry no text; labels belong in the answer's
//! text or table.

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::{Error, Result};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 400;
const MARGIN: u32 = 40;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([64, 64, 64]);
const SERIES: Rgb<u8> = Rgb([47, 111, 181]);
const MARKER_RADIUS: i64 = 3;

/// One bar per label, scaled to the largest value. Returns a base64-encoded PNG.
pub fn bar_chart(labels: &[String], values: &[f64]) -> Result<String> {
	if labels.len() != values.len() {
		return Err(invalid(format!(
			"bar_chart() got {} labels for {} values.",
			labels.len(),
			values.len()
		)));
	}

	let scale = Scale::new(values, "bar_chart()")?;
	let mut canvas = canvas();
	// Fractional slots so that more bars than pixels still pack into the plot area.
	let slot = plot_width() as f64 / values.len() as f64;
	let bar = ((slot * 0.6).round() as u32).max(1);
	let inset = (slot - bar as f64).max(0.0) / 2.0;

	for (idx, value) in values.iter().enumerate() {
		let left = MARGIN + (slot * idx as f64 + inset) as u32;
		let top = scale.y(*value);
		let bottom = scale.y(0.0);

		fill_rect(&mut canvas, left, top.min(bottom), bar, top.abs_diff(bottom).max(1));
	}

	draw_axes(&mut canvas);

	encode(canvas)
}

/// A polyline over `values` at even horizontal spacing, with a marker on each point.
pub fn line_chart(values: &[f64]) -> Result<String> {
	let scale = Scale::new(values, "line_chart()")?;
	let mut canvas = canvas();
	let gaps = values.len().saturating_sub(1).max(1);
	let step = plot_width() as f64 / gaps as f64;
	let points: Vec<(i64, i64)> = values
		.iter()
		.enumerate()
		.map(|(idx, value)| {
			let x = MARGIN as f64 + step * idx as f64;

			(x.round() as i64, scale.y(*value) as i64)
		})
		.collect();

	draw_axes(&mut canvas);

	for pair in points.windows(2) {
		draw_line(&mut canvas, pair[0], pair[1], SERIES);
	}
	for (x, y) in &points {
		for dx in -MARKER_RADIUS..=MARKER_RADIUS {
			for dy in -MARKER_RADIUS..=MARKER_RADIUS {
				put(&mut canvas, x + dx, y + dy, SERIES);
			}
		}
	}

	encode(canvas)
}

/// Vertical mapping from data values to pixel rows. The range always includes zero.
struct Scale {
	floor: f64,
	ceil: f64,
}
impl Scale {
	fn new(values: &[f64], what: &str) -> Result<Self> {
		if values.is_empty() {
			return Err(invalid(format!("{what} needs at least one value.")));
		}
		if let Some(bad) = values.iter().find(|value| !value.is_finite()) {
			return Err(invalid(format!("{what} values must be finite numbers, got {bad}.")));
		}

		let floor = values.iter().copied().fold(0.0_f64, f64::min);
		let mut ceil = values.iter().copied().fold(0.0_f64, f64::max);

		if ceil - floor < f64::EPSILON {
			ceil = floor + 1.0;
		}

		Ok(Self { floor, ceil })
	}

	fn y(&self, value: f64) -> u32 {
		let height = plot_height() as f64;
		let ratio = (value - self.floor) / (self.ceil - self.floor);

		(MARGIN as f64 + height - ratio * height).round() as u32
	}
}

fn canvas() -> RgbImage {
	RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND)
}

fn plot_width() -> u32 {
	WIDTH - 2 * MARGIN
}

fn plot_height() -> u32 {
	HEIGHT - 2 * MARGIN
}

fn draw_axes(canvas: &mut RgbImage) {
	let origin = (MARGIN as i64, (HEIGHT - MARGIN) as i64);

	draw_line(canvas, origin, ((WIDTH - MARGIN) as i64, origin.1), AXIS);
	draw_line(canvas, origin, (origin.0, MARGIN as i64), AXIS);
}

fn fill_rect(canvas: &mut RgbImage, left: u32, top: u32, width: u32, height: u32) {
	for x in left..left + width {
		for y in top..top + height {
			put(canvas, x as i64, y as i64, SERIES);
		}
	}
}

// Bresenham.
fn draw_line(canvas: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
	let (mut x, mut y) = from;
	let dx = (to.0 - x).abs();
	let dy = -(to.1 - y).abs();
	let sx = if x < to.0 { 1 } else { -1 };
	let sy = if y < to.1 { 1 } else { -1 };
	let mut err = dx + dy;

	loop {
		put(canvas, x, y, color);

		if x == to.0 && y == to.1 {
			break;
		}

		let doubled = 2 * err;

		if doubled >= dy {
			err += dy;
			x += sx;
		}
		if doubled <= dx {
			err += dx;
			y += sy;
		}
	}
}

fn put(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
	if (0..WIDTH as i64).contains(&x) && (0..HEIGHT as i64).contains(&y) {
		canvas.put_pixel(x as u32, y as u32, color);
	}
}

fn encode(canvas: RgbImage) -> Result<String> {
	let mut png = Vec::new();

	DynamicImage::ImageRgb8(canvas)
		.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
		.map_err(|err| Error::Sandbox { message: format!("Failed to encode chart: {err}.") })?;

	Ok(STANDARD.encode(png))
}

fn invalid(message: String) -> Error {
	Error::InvalidRequest { message }
}
