use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::color::{Color, Palette};
use crate::error::GifError;
use crate::math::Rect;

/// What the canvas should do with the region just painted before the *next* frame is drawn.
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromPrimitive)]
pub enum DisposalMethod {
	Keep = 0,
	ClearToBackgroundColor = 2,
	Revert = 3,
}

impl DisposalMethod {
	/// Maps a graphic control extension's 3-bit disposal field. Values 0 and 1 both mean "keep",
	/// per GIF89a.
	pub fn from_field(value: u8) -> Result<DisposalMethod, GifError> {
		match value {
			0 | 1 => Ok(DisposalMethod::Keep),
			other => DisposalMethod::from_u8(other).ok_or(GifError::InvalidDisposalMethod(other)),
		}
	}
}

impl Default for DisposalMethod {
	fn default() -> DisposalMethod {
		DisposalMethod::Keep
	}
}

/// Transient per-image state carried by a graphic control extension, valid for the single image
/// that follows it.
#[derive(Debug, Copy, Clone)]
pub struct GraphicControl {
	pub has_transparency: bool,
	pub transparent_color_index: i16,
	pub delay_time: u16,
	pub disposal_method: DisposalMethod,
}

impl Default for GraphicControl {
	fn default() -> GraphicControl {
		GraphicControl {
			has_transparency: false,
			transparent_color_index: -1,
			delay_time: 0,
			disposal_method: DisposalMethod::Keep,
		}
	}
}

/// One fully composited output frame: a stable index, its display delay, and a borrowed view of
/// the canvas' color buffer at the moment it was produced. The borrow ties the frame's lifetime
/// to the decoder, so the compiler rejects retaining it across the next mutating call.
#[derive(Debug)]
pub struct Frame<'a> {
	pub index: u32,
	pub delay_cs: u16,
	pub colors: &'a [Color],
}

impl<'a> Frame<'a> {
	/// The frame's colors reinterpreted as raw interleaved RGBA bytes, ready for a GPU texture
	/// upload call, without copying.
	#[inline]
	pub fn as_bytes(&self) -> &'a [u8] {
		crate::color::as_byte_slice(self.colors)
	}
}

/// Builds the four-pass GIF interlace row order for a sub-image of height `h`: start 0 step 8,
/// start 4 step 8, start 2 step 4, start 1 step 2.
fn interlaced_row_order(h: u32) -> Vec<u32> {
	let mut order = Vec::with_capacity(h as usize);
	for start in [0u32, 4, 2, 1] {
		let step = if start == 0 || start == 4 { 8 } else if start == 2 { 4 } else { 2 };
		let mut row = start;
		while row < h {
			order.push(row);
			row += step;
		}
	}
	order
}

fn sequential_row_order(h: u32) -> Vec<u32> {
	(0..h).collect()
}

/// A full-screen RGBA framebuffer onto which every frame of a GIF is composited in turn. Owns its
/// pixel buffer and an optional same-sized "revert" snapshot buffer; both are allocated once and
/// reused across frames.
#[derive(Debug)]
pub struct Canvas {
	width: u32,
	height: u32,
	colors: Vec<Color>,
	revert_buffer: Option<Vec<Color>>,
	background: Color,

	previous_disposal: DisposalMethod,

	frame_rect: Rect,
	palette: Palette,
	transparent_color_index: i16,
	current_disposal: DisposalMethod,

	row_order: Vec<u32>,
	cursor_row: usize,
	cursor_col: u32,
	flip_vertically: bool,
}

impl Canvas {
	pub fn new() -> Canvas {
		Canvas {
			width: 0,
			height: 0,
			colors: Vec::new(),
			revert_buffer: None,
			background: Color::TRANSPARENT_BLACK,
			previous_disposal: DisposalMethod::Keep,
			frame_rect: Rect::new(0, 0, 0, 0),
			palette: Palette::new(),
			transparent_color_index: -1,
			current_disposal: DisposalMethod::Keep,
			row_order: Vec::new(),
			cursor_row: 0,
			cursor_col: 0,
			flip_vertically: true,
		}
	}

	#[inline]
	pub fn width(&self) -> u32 {
		self.width
	}

	#[inline]
	pub fn height(&self) -> u32 {
		self.height
	}

	#[inline]
	pub fn colors(&self) -> &[Color] {
		&self.colors
	}

	#[inline]
	pub fn set_flip_vertically(&mut self, flip: bool) {
		self.flip_vertically = flip;
	}

	#[inline]
	pub fn flip_vertically(&self) -> bool {
		self.flip_vertically
	}

	#[inline]
	pub fn set_background(&mut self, background: Color) {
		self.background = background;
	}

	/// Resizes the backing buffer if necessary and always calls [Canvas::reset].
	pub fn set_size(&mut self, width: u32, height: u32) {
		if self.width != width || self.height != height {
			self.width = width;
			self.height = height;
			self.colors = vec![Color::TRANSPARENT_BLACK; (width * height) as usize];
			self.revert_buffer = None;
		}
		self.reset();
	}

	/// Fills the buffer with transparent black and forgets any prior disposal state.
	pub fn reset(&mut self) {
		if !self.colors.is_empty() {
			self.colors.fill(Color::TRANSPARENT_BLACK);
		}
		self.previous_disposal = DisposalMethod::Keep;
	}

	/// Applies the previous frame's disposal, snapshots for this frame's disposal if it is
	/// `Revert`, and precomputes the interlace row schedule. Must be followed by exactly `h`
	/// calls to [Canvas::output_pixel] (one per source row) before the next `begin_frame`.
	pub fn begin_frame(
		&mut self,
		rect: Rect,
		palette: Palette,
		transparent_color_index: i16,
		interlaced: bool,
		disposal: DisposalMethod,
	) -> Result<(), GifError> {
		if rect.x < 0
			|| rect.y < 0
			|| (rect.x as u32 + rect.width) > self.width
			|| (rect.y as u32 + rect.height) > self.height
		{
			return Err(GifError::FrameOutOfBounds);
		}

		match self.previous_disposal {
			DisposalMethod::Keep => {}
			DisposalMethod::ClearToBackgroundColor => {
				let cleared = self.background.transparent();
				self.colors.fill(cleared);
			}
			DisposalMethod::Revert => {
				if let Some(saved) = &self.revert_buffer {
					self.colors.copy_from_slice(saved);
				}
			}
		}

		if disposal == DisposalMethod::Revert {
			match &mut self.revert_buffer {
				Some(buffer) => buffer.copy_from_slice(&self.colors),
				None => self.revert_buffer = Some(self.colors.clone()),
			}
		}

		self.frame_rect = rect;
		self.palette = palette;
		self.transparent_color_index = transparent_color_index;
		self.current_disposal = disposal;
		self.previous_disposal = disposal;

		self.row_order = if interlaced { interlaced_row_order(rect.height) } else { sequential_row_order(rect.height) };
		self.cursor_row = 0;
		self.cursor_col = 0;

		Ok(())
	}

	/// Writes (or skips, if transparent) the next pixel of the current frame, advancing the
	/// cursor across the precomputed row schedule. A no-op once the frame's full pixel count has
	/// been delivered (tolerates LZW streams that decode a few bytes past `w * h`).
	pub fn output_pixel(&mut self, color_index: u8) -> Result<(), GifError> {
		if self.cursor_row >= self.row_order.len() {
			return Ok(());
		}

		let is_transparent = self.transparent_color_index >= 0 && color_index as i16 == self.transparent_color_index;
		if !is_transparent {
			if !self.palette.contains(color_index) {
				return Err(GifError::PaletteIndexOutOfRange(color_index, self.palette.len()));
			}
			let source_row = self.row_order[self.cursor_row];
			let canvas_row = if self.flip_vertically {
				self.height - 1 - (self.frame_rect.y as u32 + source_row)
			} else {
				self.frame_rect.y as u32 + source_row
			};
			let canvas_col = self.frame_rect.x as u32 + self.cursor_col;
			let offset = (canvas_row * self.width + canvas_col) as usize;
			self.colors[offset] = self.palette[color_index];
		}

		self.cursor_col += 1;
		if self.cursor_col == self.frame_rect.width {
			self.cursor_col = 0;
			self.cursor_row += 1;
		}
		Ok(())
	}
}

impl Default for Canvas {
	fn default() -> Canvas {
		Canvas::new()
	}
}
