mod serial;

pub use self::serial::{
	SerialTransport,
	open_serial,
};

use std::io;
use std::time::Duration;

/// Duplex byte stream to the adapter.
///
/// The protocol core only ever talks to this trait; the concrete serial
/// port stays behind it.
pub trait Transport {
	fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

	/// Read up to `buf.len()` bytes, returning how many arrived within the
	/// configured timeout. A timeout is reported as `Ok(0)`, not an error.
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

	fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}
