pub mod buffer;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod library;
pub mod mix;
pub mod output;
pub mod pipeline;
pub mod slice;
pub mod status;

pub use buffer::PcmBuffer;
pub use error::{Error, Result};
