// to get everything this crate has to offer

pub use crate::{
	canvas::{Canvas, DisposalMethod, Frame, GraphicControl},
	color::{Color, Palette},
	decoder::{GifVersion, StreamDecoder, Token},
	error::GifError,
};
