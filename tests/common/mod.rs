//! Assembles synthetic GIF byte streams in memory so the integration tests below can exercise
//! [gifstream::decoder::StreamDecoder] end-to-end without shipping binary `.gif` fixture files.

use std::collections::HashMap;

const MAX_CODE_VALUE: u16 = 4095;

/// A standalone LZW encoder mirroring the dictionary-growth rules of
/// [gifstream::lzw::LzwDictionary] (clear/stop codes, code-width bumps at powers of two, a table
/// reset at 4096 entries), kept independent of the decoder's own internals.
pub fn lzw_encode(min_code_size: u8, pixels: &[u8]) -> Vec<u8> {
	let initial_size = 1u16 << min_code_size;
	let clear_code = initial_size;
	let stop_code = initial_size + 1;

	let mut table: HashMap<Vec<u8>, u16> = (0..initial_size).map(|i| (vec![i as u8], i)).collect();
	let mut next_code = stop_code + 1;
	let mut code_width = min_code_size as usize + 1;

	let mut packer = BitPacker::new();
	packer.push(clear_code, code_width);

	let mut pixels = pixels.iter().copied();
	let mut buffer = match pixels.next() {
		Some(byte) => vec![byte],
		None => {
			packer.push(stop_code, code_width);
			return packer.finish();
		}
	};

	for byte in pixels {
		let mut extended = buffer.clone();
		extended.push(byte);

		if table.contains_key(&extended) {
			buffer = extended;
			continue;
		}

		let code = *table.get(&buffer).expect("buffer always present in table");
		packer.push(code, code_width);

		table.insert(extended, next_code);
		if next_code > (1u16 << code_width) - 1 && code_width < 12 {
			code_width += 1;
		}
		next_code += 1;

		if next_code > MAX_CODE_VALUE {
			packer.push(clear_code, code_width);
			table = (0..initial_size).map(|i| (vec![i as u8], i)).collect();
			next_code = stop_code + 1;
			code_width = min_code_size as usize + 1;
		}

		buffer = vec![byte];
	}

	let code = *table.get(&buffer).expect("buffer always present in table");
	packer.push(code, code_width);
	packer.push(stop_code, code_width);
	packer.finish()
}

struct BitPacker {
	buffer: u32,
	buffer_bits: usize,
	bytes: Vec<u8>,
}

impl BitPacker {
	fn new() -> BitPacker {
		BitPacker { buffer: 0, buffer_bits: 0, bytes: Vec::new() }
	}

	fn push(&mut self, code: u16, width: usize) {
		self.buffer |= (code as u32) << self.buffer_bits;
		self.buffer_bits += width;
		while self.buffer_bits >= 8 {
			self.bytes.push((self.buffer & 0xFF) as u8);
			self.buffer >>= 8;
			self.buffer_bits -= 8;
		}
	}

	fn finish(mut self) -> Vec<u8> {
		if self.buffer_bits > 0 {
			self.bytes.push((self.buffer & 0xFF) as u8);
		}
		self.bytes
	}
}

fn palette_size_bits(len: usize) -> u8 {
	let mut n = 1u32;
	while (1usize << n) < len.max(2) {
		n += 1;
	}
	(n - 1) as u8
}

fn write_palette(out: &mut Vec<u8>, palette: &[(u8, u8, u8)], table_size_bits: u8) {
	let count = 1usize << (table_size_bits as usize + 1);
	for i in 0..count {
		let (r, g, b) = palette.get(i).copied().unwrap_or((0, 0, 0));
		out.push(r);
		out.push(g);
		out.push(b);
	}
}

fn write_sub_blocks(out: &mut Vec<u8>, data: &[u8]) {
	for chunk in data.chunks(255) {
		out.push(chunk.len() as u8);
		out.extend_from_slice(chunk);
	}
	out.push(0);
}

/// One image block to append to a multi-frame synthetic GIF: its rectangle, optional graphic
/// control state, and its pixel data (palette indices).
pub struct ImageSpec {
	pub left: u16,
	pub top: u16,
	pub width: u16,
	pub height: u16,
	pub min_code_size: u8,
	pub pixels: Vec<u8>,
	pub interlaced: bool,
	pub disposal: Option<u8>,
	pub transparent_index: Option<u8>,
	pub delay_cs: u16,
}

impl ImageSpec {
	pub fn new(left: u16, top: u16, width: u16, height: u16, min_code_size: u8, pixels: Vec<u8>) -> ImageSpec {
		ImageSpec {
			left,
			top,
			width,
			height,
			min_code_size,
			pixels,
			interlaced: false,
			disposal: None,
			transparent_index: None,
			delay_cs: 0,
		}
	}

	pub fn disposal(mut self, method: u8) -> ImageSpec {
		self.disposal = Some(method);
		self
	}

	pub fn transparent(mut self, index: u8) -> ImageSpec {
		self.transparent_index = Some(index);
		self
	}

	pub fn interlaced(mut self, interlaced: bool) -> ImageSpec {
		self.interlaced = interlaced;
		self
	}

	pub fn delay(mut self, cs: u16) -> ImageSpec {
		self.delay_cs = cs;
		self
	}
}

/// The raw bytes of a GIF application extension (label 0xFF) holding the NETSCAPE2.0 looping-count
/// payload, exactly as real encoders emit it, to confirm the decoder silently skips it as an
/// unrecognized extension.
pub fn netscape_loop_extension_bytes() -> Vec<u8> {
	let mut out = Vec::new();
	out.push(0x21);
	out.push(0xFF);
	out.push(11);
	out.extend_from_slice(b"NETSCAPE2.0");
	out.push(3);
	out.push(1);
	out.extend_from_slice(&0u16.to_le_bytes());
	out.push(0);
	out
}

/// Appends a comment extension (label 0xFE) with the given text.
pub fn append_comment_extension(out: &mut Vec<u8>, text: &str) {
	out.push(0x21);
	out.push(0xFE);
	write_sub_blocks(out, text.as_bytes());
}

fn append_graphic_control(out: &mut Vec<u8>, image: &ImageSpec) {
	if image.disposal.is_none() && image.transparent_index.is_none() && image.delay_cs == 0 {
		return;
	}
	out.push(0x21);
	out.push(0xF9);
	out.push(4);
	let mut flags = 0u8;
	if let Some(method) = image.disposal {
		flags |= method << 2;
	}
	if image.transparent_index.is_some() {
		flags |= 0b0000_0001;
	}
	out.push(flags);
	out.extend_from_slice(&image.delay_cs.to_le_bytes());
	out.push(image.transparent_index.unwrap_or(0));
	out.push(0);
}

fn append_image(out: &mut Vec<u8>, image: &ImageSpec) {
	append_graphic_control(out, image);

	out.push(0x2C);
	out.extend_from_slice(&image.left.to_le_bytes());
	out.extend_from_slice(&image.top.to_le_bytes());
	out.extend_from_slice(&image.width.to_le_bytes());
	out.extend_from_slice(&image.height.to_le_bytes());
	out.push(if image.interlaced { 0b0100_0000 } else { 0 });

	out.push(image.min_code_size);
	let encoded = lzw_encode(image.min_code_size, &image.pixels);
	write_sub_blocks(out, &encoded);
}

/// Builds a complete GIF89a byte stream: header, logical screen descriptor with a global palette,
/// zero or more image blocks (each preceded by its own graphic control extension, if specified),
/// and a trailer.
pub fn build_gif(width: u16, height: u16, background_index: u8, palette: &[(u8, u8, u8)], images: &[ImageSpec]) -> Vec<u8> {
	build_gif_with_extensions(width, height, background_index, palette, images, &[])
}

/// Like [build_gif], but splices the raw bytes of `extensions_before[i]` (if any) immediately
/// before image block `i`, letting callers insert e.g. [append_netscape_loop_extension] between
/// two frames.
pub fn build_gif_with_extensions(
	width: u16,
	height: u16,
	background_index: u8,
	palette: &[(u8, u8, u8)],
	images: &[ImageSpec],
	extensions_before: &[(usize, Vec<u8>)],
) -> Vec<u8> {
	let mut out = Vec::new();
	out.extend_from_slice(b"GIF89a");

	let table_size_bits = palette_size_bits(palette.len());
	out.extend_from_slice(&width.to_le_bytes());
	out.extend_from_slice(&height.to_le_bytes());
	out.push(0b1000_0000 | table_size_bits);
	out.push(background_index);
	out.push(0);

	write_palette(&mut out, palette, table_size_bits);

	for (index, image) in images.iter().enumerate() {
		if let Some((_, bytes)) = extensions_before.iter().find(|(i, _)| *i == index) {
			out.extend_from_slice(bytes);
		}
		append_image(&mut out, image);
	}

	out.push(0x3B);
	out
}
