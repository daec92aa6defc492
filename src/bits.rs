use byteorder::ReadBytesExt;

use crate::error::GifError;

const MAX_CODE_BITS: usize = 12;

/// Reads a chain of GIF sub-blocks (each a one-byte length followed by that many data bytes,
/// terminated by a zero-length block) as a bitstream of LSB-first, variable-width codes.
///
/// The reader does not own the underlying stream; it is passed in on each call, mirroring how the
/// rest of this decoder borrows the caller's stream only for the duration of a single operation.
#[derive(Debug)]
pub struct BitBlockReader {
	buffer: u32,
	buffer_bits: usize,
	code_width: usize,
	sub_block_remaining: u8,
	end_reached: bool,
}

impl BitBlockReader {
	pub fn new() -> BitBlockReader {
		BitBlockReader { buffer: 0, buffer_bits: 0, code_width: 0, sub_block_remaining: 0, end_reached: false }
	}

	/// Resets all state so the reader is ready to read a fresh sub-block chain starting at
	/// `min_code_size + 1` bits per code.
	pub fn start(&mut self, min_code_size: u8) {
		self.buffer = 0;
		self.buffer_bits = 0;
		self.code_width = min_code_size as usize + 1;
		self.sub_block_remaining = 0;
		self.end_reached = false;
	}

	#[inline]
	pub fn set_code_width(&mut self, bits: usize) {
		debug_assert!((1..=MAX_CODE_BITS).contains(&bits));
		self.code_width = bits;
	}

	#[inline]
	pub fn code_width(&self) -> usize {
		self.code_width
	}

	#[inline]
	pub fn end_reached(&self) -> bool {
		self.end_reached
	}

	fn read_byte<T: ReadBytesExt>(&mut self, reader: &mut T) -> Result<Option<u8>, GifError> {
		if self.end_reached {
			return Ok(None);
		}
		if self.sub_block_remaining == 0 {
			self.sub_block_remaining = reader.read_u8()?;
			if self.sub_block_remaining == 0 {
				self.end_reached = true;
				return Ok(None);
			}
		}
		self.sub_block_remaining -= 1;
		Ok(Some(reader.read_u8()?))
	}

	/// Reads the next `code_width`-bit code. Once the sub-block chain's terminator has been
	/// consumed, further calls synthesize zero bits rather than erroring, tolerating encoders that
	/// emit one extra padding code past the last real one.
	pub fn read_code<T: ReadBytesExt>(&mut self, reader: &mut T) -> Result<u16, GifError> {
		while self.buffer_bits < self.code_width {
			match self.read_byte(reader)? {
				Some(byte) => {
					self.buffer |= (byte as u32) << self.buffer_bits;
					self.buffer_bits += 8;
				}
				None => {
					self.buffer_bits = self.code_width;
					break;
				}
			}
		}

		let mask = (1u32 << self.code_width) - 1;
		let code = (self.buffer & mask) as u16;
		self.buffer >>= self.code_width;
		self.buffer_bits = self.buffer_bits.saturating_sub(self.code_width);
		Ok(code)
	}

	/// Consumes any remaining sub-blocks in the current chain, up to and including the
	/// zero-length terminator. Used after a stop code to leave the stream positioned at the next
	/// top-level block.
	pub fn drain<T: ReadBytesExt>(&mut self, reader: &mut T) -> Result<(), GifError> {
		while !self.end_reached {
			if self.sub_block_remaining == 0 {
				self.sub_block_remaining = reader.read_u8()?;
				if self.sub_block_remaining == 0 {
					self.end_reached = true;
					break;
				}
			}
			let skip = self.sub_block_remaining;
			for _ in 0..skip {
				reader.read_u8()?;
			}
			self.sub_block_remaining = 0;
		}
		Ok(())
	}
}

impl Default for BitBlockReader {
	fn default() -> BitBlockReader {
		BitBlockReader::new()
	}
}
