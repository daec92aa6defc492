use std::ops::{Index, IndexMut};

use byte_slice_cast::{AsByteSlice, ToByteSlice};
use byteorder::ReadBytesExt;

use crate::error::GifError;

const MAX_COLORS: usize = 256;

/// A plain RGBA color, stored as four separate 8-bit components rather than a packed integer, so
/// that a slice of these can be reinterpreted as a raw byte slice for texture upload without a
/// conversion pass (see [as_byte_slice]).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[repr(C)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: u8,
}

// Sound because `Color` is `repr(C)`, `Copy`, and exactly four `u8` fields with no padding, so its
// in-memory layout is identical to `[u8; 4]`.
unsafe impl ToByteSlice for Color {}

/// Reinterprets a slice of colors as raw interleaved RGBA bytes, the same boundary conversion a
/// caller uploading a [crate::canvas::Frame] to a GPU texture needs, without copying.
#[inline]
pub fn as_byte_slice(colors: &[Color]) -> &[u8] {
	colors.as_byte_slice()
}

impl Color {
	pub const TRANSPARENT_BLACK: Color = Color { r: 0, g: 0, b: 0, a: 0 };

	#[inline]
	pub fn opaque(r: u8, g: u8, b: u8) -> Color {
		Color { r, g, b, a: 255 }
	}

	/// Same RGB, alpha forced to zero. Used when rendering a disposed-to-background region, which
	/// GIF always treats as transparent regardless of the declared background color index.
	#[inline]
	pub fn transparent(self) -> Color {
		Color { a: 0, ..self }
	}
}

/// An ordered sequence of up to 256 colors, read directly out of a GIF's global or local color
/// table. `len` is the table's declared size (always a power of two in a well-formed GIF); index
/// validation uses `len`, not a fixed 256.
#[derive(Debug, Copy, Clone)]
pub struct Palette {
	colors: [Color; MAX_COLORS],
	len: usize,
}

impl Palette {
	pub fn new() -> Palette {
		Palette { colors: [Color::default(); MAX_COLORS], len: 0 }
	}

	/// Reads `num_colors` 3-byte (R, G, B) entries from `reader`, filling alpha to 255.
	///
	/// # Arguments
	///
	/// * `reader`: the reader positioned at the start of the color table
	/// * `num_colors`: the declared table size, at most 256
	pub fn load_from_bytes<T: ReadBytesExt>(reader: &mut T, num_colors: usize) -> Result<Palette, GifError> {
		let num_colors = num_colors.min(MAX_COLORS);
		let mut colors = [Color::default(); MAX_COLORS];
		for slot in colors.iter_mut().take(num_colors) {
			let r = reader.read_u8()?;
			let g = reader.read_u8()?;
			let b = reader.read_u8()?;
			*slot = Color::opaque(r, g, b);
		}
		Ok(Palette { colors, len: num_colors })
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.len
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[inline]
	pub fn contains(&self, index: u8) -> bool {
		(index as usize) < self.len
	}
}

impl Default for Palette {
	fn default() -> Palette {
		Palette::new()
	}
}

impl Index<u8> for Palette {
	type Output = Color;

	#[inline]
	fn index(&self, index: u8) -> &Color {
		&self.colors[index as usize]
	}
}

impl IndexMut<u8> for Palette {
	#[inline]
	fn index_mut(&mut self, index: u8) -> &mut Color {
		&mut self.colors[index as usize]
	}
}
