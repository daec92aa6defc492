use thiserror::Error;

/// The complete set of ways a [crate::decoder::StreamDecoder] can fail.
#[derive(Error, Debug)]
pub enum GifError {
	#[error("not a valid GIF file (bad signature or version)")]
	MalformedHeader,

	#[error("unrecognized top-level block introducer: {0:#04x}")]
	UnknownBlock(u8),

	#[error("malformed graphic control extension")]
	InvalidGraphicControl,

	#[error("invalid disposal method value: {0}")]
	InvalidDisposalMethod(u8),

	#[error("unexpected end of stream while reading GIF data")]
	TruncatedStream(#[from] std::io::Error),

	#[error("decoder is not in the expected state for this operation")]
	InvalidState,

	#[error("image rectangle does not fit within the logical screen")]
	FrameOutOfBounds,

	#[error("color index {0} is out of range for the active palette of size {1}")]
	PaletteIndexOutOfRange(u8, usize),

	#[error("stream is not seekable, cannot reset decoder")]
	NotSeekable,
}
