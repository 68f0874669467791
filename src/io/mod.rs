//! Streaming I/O helpers: the range-seekable reader (C5) and the
//! block-alignment buffering stream used by client-side encryption (C8).

mod multipart_output_stream;
mod range_reader;

pub use multipart_output_stream::MultipartOutputStream;
pub use range_reader::RangeSeekableReader;
