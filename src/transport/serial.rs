use std::io::{
	self,
	Read,
	Write,
};
use std::time::Duration;

use serialport::SerialPort;

use super::Transport;

pub struct SerialTransport {
	port: Box<dyn SerialPort>,
}

pub fn open_serial(path: &str, baud_rate: u32, timeout: Duration) -> crate::AResult<SerialTransport> {
	with_context!(("couldn't open serial port {}", path), {
		let port = serialport::new(path, baud_rate)
			.data_bits(serialport::DataBits::Eight)
			.parity(serialport::Parity::None)
			.stop_bits(serialport::StopBits::One)
			.flow_control(serialport::FlowControl::None)
			.timeout(timeout)
			.open()?;
		Ok(SerialTransport { port })
	})
}

impl Transport for SerialTransport {
	fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
		self.port.write_all(data)?;
		self.port.flush()
	}

	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		match self.port.read(buf) {
			Ok(n) => Ok(n),
			Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
			Err(e) => Err(e),
		}
	}

	fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
		self.port.set_timeout(timeout).map_err(io::Error::from)
	}
}
