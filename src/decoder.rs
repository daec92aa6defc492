use std::io::{Read, Seek, SeekFrom};

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};

use crate::bits::BitBlockReader;
use crate::canvas::{Canvas, DisposalMethod, Frame, GraphicControl};
use crate::color::Palette;
use crate::error::GifError;
use crate::lzw::LzwDictionary;
use crate::math::Rect;

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;

const LABEL_PLAIN_TEXT: u8 = 0x01;
const LABEL_GRAPHIC_CONTROL: u8 = 0xF9;
const LABEL_COMMENT: u8 = 0xFE;
const LABEL_APPLICATION: u8 = 0xFF;

bitflags! {
	/// The logical screen descriptor's single flags byte. The low 3 bits (not modeled as a named
	/// flag here, since they're a multi-bit size field rather than a boolean) give the global color
	/// table size as `2^(n+1)`.
	#[derive(Debug, Copy, Clone, Eq, PartialEq)]
	struct ScreenDescriptorFlags: u8 {
		const GLOBAL_COLOR_TABLE = 0b1000_0000;
	}
}

bitflags! {
	/// An image descriptor's single flags byte. The low 3 bits give the local color table size the
	/// same way as [ScreenDescriptorFlags].
	#[derive(Debug, Copy, Clone, Eq, PartialEq)]
	struct ImageDescriptorFlags: u8 {
		const LOCAL_COLOR_TABLE = 0b1000_0000;
		const INTERLACED = 0b0100_0000;
	}
}

bitflags! {
	/// A graphic control extension's single flags byte. Bits 2-4 (extracted separately, since
	/// they're a multi-bit field, not a boolean) give the disposal method.
	#[derive(Debug, Copy, Clone, Eq, PartialEq)]
	struct GraphicControlFlags: u8 {
		const HAS_TRANSPARENCY = 0b0000_0001;
	}
}

#[inline]
fn color_table_size(flags: u8) -> usize {
	1usize << ((flags & 0b0000_0111) + 1)
}

/// Which dialect of the format this file declares itself as. Decoding behavior does not branch on
/// this; it is surfaced purely for callers that care.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GifVersion {
	Gif87a,
	Gif89a,
}

/// The decoder's current position in the token state machine. [Token::Unknown] is the only state
/// in which [StreamDecoder::next_token] may be called; every other state must be resolved by a
/// matching `read_*`/`skip_*` call, which returns the decoder to [Token::Unknown].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Token {
	Unknown,
	Image,
	Comment,
	EndOfFile,
}

/// A streaming, pull-style GIF87a/89a decoder. The caller drives decoding by alternating
/// [StreamDecoder::next_token] with whichever of [StreamDecoder::read_image],
/// [StreamDecoder::read_comment], or the `skip_*` variants matches the returned token.
#[derive(Debug)]
pub struct StreamDecoder<R> {
	stream: Option<R>,
	width: u16,
	height: u16,
	version: GifVersion,
	/// The stream position just after the logical screen descriptor, recorded only when the
	/// decoder was bound via [StreamDecoder::set_seekable_stream]. `None` otherwise, including for
	/// a freshly-constructed, unbound decoder; [StreamDecoder::reset] requires this to be `Some`.
	data_start: Option<u64>,
	global_palette: Option<Palette>,
	background_index: u8,

	canvas: Canvas,
	bit_reader: BitBlockReader,
	dictionary: LzwDictionary,
	graphic_control: GraphicControl,

	token: Token,
	frame_index: u32,
}

impl<R: Read> StreamDecoder<R> {
	pub fn new() -> StreamDecoder<R> {
		StreamDecoder {
			stream: None,
			width: 0,
			height: 0,
			version: GifVersion::Gif89a,
			data_start: None,
			global_palette: None,
			background_index: 0,
			canvas: Canvas::new(),
			bit_reader: BitBlockReader::new(),
			dictionary: LzwDictionary::new(),
			graphic_control: GraphicControl::default(),
			token: Token::Unknown,
			frame_index: 0,
		}
	}

	pub fn new_with_stream(stream: R) -> Result<StreamDecoder<R>, GifError> {
		let mut decoder = StreamDecoder::new();
		decoder.bind(stream)?;
		Ok(decoder)
	}

	/// Binds a new stream, parsing its header and logical screen descriptor eagerly. Any
	/// previously bound stream is dropped.
	pub fn set_stream(&mut self, stream: R) -> Result<(), GifError> {
		self.bind(stream)
	}

	fn bind(&mut self, mut stream: R) -> Result<(), GifError> {
		self.read_header(&mut stream)?;
		self.stream = Some(stream);
		self.data_start = None;
		self.token = Token::Unknown;
		self.frame_index = 0;
		self.graphic_control = GraphicControl::default();
		self.canvas.reset();
		Ok(())
	}

	#[inline]
	pub fn width(&self) -> u16 {
		self.width
	}

	#[inline]
	pub fn height(&self) -> u16 {
		self.height
	}

	#[inline]
	pub fn version(&self) -> GifVersion {
		self.version
	}

	#[inline]
	pub fn set_flip_vertically(&mut self, flip: bool) {
		self.canvas.set_flip_vertically(flip);
	}

	#[inline]
	pub fn flip_vertically(&self) -> bool {
		self.canvas.flip_vertically()
	}

	/// Releases the bound stream, if any.
	pub fn dispose(&mut self) {
		self.stream = None;
	}

	fn stream_mut(&mut self) -> Result<&mut R, GifError> {
		self.stream.as_mut().ok_or(GifError::InvalidState)
	}

	fn read_header(&mut self, stream: &mut R) -> Result<(), GifError> {
		let mut signature = [0u8; 6];
		stream.read_exact(&mut signature)?;
		self.version = match &signature {
			b"GIF87a" => GifVersion::Gif87a,
			b"GIF89a" => GifVersion::Gif89a,
			_ => return Err(GifError::MalformedHeader),
		};

		self.width = stream.read_u16::<LittleEndian>()?;
		self.height = stream.read_u16::<LittleEndian>()?;

		let flags = ScreenDescriptorFlags::from_bits_retain(stream.read_u8()?);
		let has_global_table = flags.contains(ScreenDescriptorFlags::GLOBAL_COLOR_TABLE);
		let global_table_size = color_table_size(flags.bits());

		self.background_index = stream.read_u8()?;
		let _pixel_aspect_ratio = stream.read_u8()?;

		self.global_palette = if has_global_table { Some(Palette::load_from_bytes(stream, global_table_size)?) } else { None };

		self.canvas.set_size(self.width as u32, self.height as u32);
		if let Some(palette) = &self.global_palette {
			if (self.background_index as usize) < palette.len() {
				self.canvas.set_background(palette[self.background_index]);
			}
		}

		Ok(())
	}

	/// Reads the next top-level block, advancing past any extensions that don't themselves
	/// produce a token (graphic control, unrecognized/application/plain-text extensions), and
	/// returns the resulting token. Valid only when the current token is [Token::Unknown].
	pub fn next_token(&mut self) -> Result<Token, GifError> {
		if self.token != Token::Unknown {
			return Err(GifError::InvalidState);
		}

		loop {
			let introducer = {
				let stream = self.stream_mut()?;
				stream.read_u8()?
			};

			match introducer {
				TRAILER => {
					self.token = Token::EndOfFile;
					return Ok(self.token);
				}
				IMAGE_DESCRIPTOR => {
					self.token = Token::Image;
					return Ok(self.token);
				}
				EXTENSION_INTRODUCER => {
					let label = {
						let stream = self.stream_mut()?;
						stream.read_u8()?
					};
					match label {
						LABEL_GRAPHIC_CONTROL => {
							self.read_graphic_control()?;
						}
						LABEL_COMMENT => {
							self.token = Token::Comment;
							return Ok(self.token);
						}
						LABEL_PLAIN_TEXT | LABEL_APPLICATION | _ => {
							self.skip_sub_blocks()?;
						}
					}
				}
				other => return Err(GifError::UnknownBlock(other)),
			}
		}
	}

	fn read_graphic_control(&mut self) -> Result<(), GifError> {
		let stream = self.stream_mut()?;
		let block_size = stream.read_u8()?;
		if block_size != 4 {
			return Err(GifError::InvalidGraphicControl);
		}

		let flags = GraphicControlFlags::from_bits_retain(stream.read_u8()?);
		let delay_time = stream.read_u16::<LittleEndian>()?;
		let transparent_color_index = stream.read_u8()?;
		let terminator = stream.read_u8()?;
		if terminator != 0 {
			return Err(GifError::InvalidGraphicControl);
		}

		let has_transparency = flags.contains(GraphicControlFlags::HAS_TRANSPARENCY);
		let disposal_method = DisposalMethod::from_field((flags.bits() >> 2) & 0b0000_0111)?;

		self.graphic_control = GraphicControl {
			has_transparency,
			transparent_color_index: if has_transparency { transparent_color_index as i16 } else { -1 },
			delay_time,
			disposal_method,
		};

		Ok(())
	}

	/// Reads and discards a chain of length-prefixed sub-blocks without interpreting their
	/// contents, used for plain text and application extensions and unrecognized labels.
	fn skip_sub_blocks(&mut self) -> Result<(), GifError> {
		loop {
			let stream = self.stream_mut()?;
			let len = stream.read_u8()?;
			if len == 0 {
				return Ok(());
			}
			let mut discard = vec![0u8; len as usize];
			stream.read_exact(&mut discard)?;
		}
	}

	/// Decodes and composites the image the current [Token::Image] refers to, returning a
	/// borrowed view of the canvas. The graphic control state accumulated since the last image is
	/// consumed and reset to defaults.
	pub fn read_image(&mut self) -> Result<Frame<'_>, GifError> {
		self.decode_image()?;
		self.token = Token::Unknown;
		let control = std::mem::take(&mut self.graphic_control);
		let frame = Frame { index: self.frame_index, delay_cs: control.delay_time, colors: self.canvas.colors() };
		self.frame_index += 1;
		Ok(frame)
	}

	/// Like [StreamDecoder::read_image], but does not construct a [Frame]. The image is still
	/// fully decoded into the canvas since later frames may depend on its disposal effects.
	pub fn skip_image(&mut self) -> Result<(), GifError> {
		self.decode_image()?;
		self.token = Token::Unknown;
		self.graphic_control = GraphicControl::default();
		self.frame_index += 1;
		Ok(())
	}

	fn decode_image(&mut self) -> Result<(), GifError> {
		if self.token != Token::Image {
			return Err(GifError::InvalidState);
		}

		let (left, top, width, height, flags) = {
			let stream = self.stream_mut()?;
			let left = stream.read_u16::<LittleEndian>()?;
			let top = stream.read_u16::<LittleEndian>()?;
			let width = stream.read_u16::<LittleEndian>()?;
			let height = stream.read_u16::<LittleEndian>()?;
			let flags = stream.read_u8()?;
			(left, top, width, height, flags)
		};

		let flags = ImageDescriptorFlags::from_bits_retain(flags);
		let has_local_table = flags.contains(ImageDescriptorFlags::LOCAL_COLOR_TABLE);
		let interlaced = flags.contains(ImageDescriptorFlags::INTERLACED);
		let local_table_size = color_table_size(flags.bits());

		let palette = if has_local_table {
			let stream = self.stream_mut()?;
			Palette::load_from_bytes(stream, local_table_size)?
		} else {
			self.global_palette.ok_or(GifError::MalformedHeader)?
		};

		let min_code_size = {
			let stream = self.stream_mut()?;
			stream.read_u8()?
		};

		let rect = Rect::new(left as i32, top as i32, width as u32, height as u32);
		self.canvas.begin_frame(
			rect,
			palette,
			self.graphic_control.transparent_color_index,
			interlaced,
			self.graphic_control.disposal_method,
		)?;

		self.bit_reader.start(min_code_size);
		self.dictionary.init(min_code_size);

		let mut last_code: i32 = -1;
		loop {
			self.bit_reader.set_code_width(self.dictionary.code_width());
			let code = {
				let stream = self.stream_mut()?;
				self.bit_reader.read_code(stream)?
			};

			if self.dictionary.is_clear_code(code) {
				self.dictionary.clear();
				last_code = -1;
				continue;
			}
			if self.dictionary.is_stop_code(code) {
				break;
			}

			if self.dictionary.contains(code) {
				let canvas = &mut self.canvas;
				self.dictionary.output(code, &mut |byte| canvas.output_pixel(byte))?;
				if last_code >= 0 {
					self.dictionary.create_new_code(last_code as u16, code);
				}
				last_code = code as i32;
			} else {
				// the "KwKwK" case: the code isn't in the dictionary yet because it's the one
				// this very code creates, so its first symbol must equal the first symbol of the
				// previous code.
				if last_code < 0 {
					return Err(GifError::InvalidState);
				}
				let new_code = self.dictionary.create_new_code(last_code as u16, last_code as u16).ok_or(GifError::InvalidState)?;
				let canvas = &mut self.canvas;
				self.dictionary.output(new_code, &mut |byte| canvas.output_pixel(byte))?;
				last_code = new_code as i32;
			}
		}

		let stream = self.stream_mut()?;
		self.bit_reader.drain(stream)?;

		Ok(())
	}

	/// Reads the comment the current [Token::Comment] refers to as a string. Non-UTF8 bytes are
	/// replaced per [String::from_utf8_lossy].
	pub fn read_comment(&mut self) -> Result<String, GifError> {
		if self.token != Token::Comment {
			return Err(GifError::InvalidState);
		}

		let mut bytes = Vec::new();
		loop {
			let stream = self.stream_mut()?;
			let len = stream.read_u8()?;
			if len == 0 {
				break;
			}
			let mut chunk = vec![0u8; len as usize];
			stream.read_exact(&mut chunk)?;
			bytes.extend_from_slice(&chunk);
		}

		self.token = Token::Unknown;
		Ok(String::from_utf8_lossy(&bytes).into_owned())
	}

	/// Discards the comment the current [Token::Comment] refers to without allocating a string.
	pub fn skip_comment(&mut self) -> Result<(), GifError> {
		if self.token != Token::Comment {
			return Err(GifError::InvalidState);
		}
		self.skip_sub_blocks()?;
		self.token = Token::Unknown;
		Ok(())
	}
}

impl<R: Read> Default for StreamDecoder<R> {
	fn default() -> StreamDecoder<R> {
		StreamDecoder::new()
	}
}

impl<R: Read + Seek> StreamDecoder<R> {
	/// Seeks the bound stream back to just after the logical screen descriptor (and global
	/// palette, if any) and reinitializes token/frame-counter/graphic-control state. If
	/// `reset_canvas` is set, the canvas is also cleared to transparent black; otherwise its
	/// current contents (and disposal/revert state) are left as-is.
	pub fn reset(&mut self, reset_canvas: bool) -> Result<(), GifError> {
		let data_start = self.data_start.ok_or(GifError::NotSeekable)?;
		let stream = self.stream.as_mut().ok_or(GifError::InvalidState)?;
		stream.seek(SeekFrom::Start(data_start))?;

		self.token = Token::Unknown;
		self.frame_index = 0;
		self.graphic_control = GraphicControl::default();
		if reset_canvas {
			self.canvas.reset();
		}

		Ok(())
	}
}

impl<R: Read + Seek> StreamDecoder<R> {
	fn bind_seekable(&mut self, mut stream: R) -> Result<(), GifError> {
		self.read_header(&mut stream)?;
		self.data_start = Some(stream.stream_position()?);
		self.stream = Some(stream);
		self.token = Token::Unknown;
		self.frame_index = 0;
		self.graphic_control = GraphicControl::default();
		self.canvas.reset();
		Ok(())
	}

	/// Constructs a decoder already bound to a seekable stream. Equivalent to
	/// [StreamDecoder::new_with_stream] but also records the data-start position needed by
	/// [StreamDecoder::reset].
	pub fn new_with_seekable_stream(stream: R) -> Result<StreamDecoder<R>, GifError> {
		let mut decoder = StreamDecoder::new();
		decoder.bind_seekable(stream)?;
		Ok(decoder)
	}

	/// Binds a new seekable stream. Equivalent to [StreamDecoder::set_stream] but also records
	/// the data-start position needed by [StreamDecoder::reset].
	pub fn set_seekable_stream(&mut self, stream: R) -> Result<(), GifError> {
		self.bind_seekable(stream)
	}
}
