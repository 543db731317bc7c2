use crate::transport::Transport;

use super::consts::*;
use super::session::{
	AdapterSession,
	Mode,
};
use super::ProtocolError;

/// I2C framing primitives and the framed transactions built from them.
///
/// Every transaction on the wire must be bracketed by exactly one start bit
/// and one stop bit, and every byte read except the last must be followed
/// by an ack (the last by a nack). `write_transaction` and `read_sequence`
/// enforce that ordering; the loose primitives remain available for
/// callers composing their own frames.
impl<T: Transport> AdapterSession<T> {
	pub fn send_start(&mut self) -> Result<(), ProtocolError> {
		assert_eq!(self.mode(), Mode::I2c, "I2C framing requires raw I2C mode");
		const CMD: &str = "start bit";
		self.write_command(CMD, &[START_BIT])?;
		self.expect_command_ack(CMD)
	}

	pub fn send_stop(&mut self) -> Result<(), ProtocolError> {
		assert_eq!(self.mode(), Mode::I2c, "I2C framing requires raw I2C mode");
		const CMD: &str = "stop bit";
		self.write_command(CMD, &[STOP_BIT])?;
		self.expect_command_ack(CMD)
	}

	pub fn send_ack(&mut self) -> Result<(), ProtocolError> {
		assert_eq!(self.mode(), Mode::I2c, "I2C framing requires raw I2C mode");
		const CMD: &str = "send ack";
		self.write_command(CMD, &[SEND_ACK])?;
		self.expect_command_ack(CMD)
	}

	pub fn send_nack(&mut self) -> Result<(), ProtocolError> {
		assert_eq!(self.mode(), Mode::I2c, "I2C framing requires raw I2C mode");
		const CMD: &str = "send nack";
		self.write_command(CMD, &[SEND_NACK])?;
		self.expect_command_ack(CMD)
	}

	/// Write 1..=16 bytes in one bulk frame.
	///
	/// The adapter answers with a command ack followed by one I2C-level
	/// ack bit per payload byte. All of them are consumed before the
	/// result is judged; a short read here would desynchronize the
	/// command stream.
	pub fn bulk_write(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
		assert_eq!(self.mode(), Mode::I2c, "I2C framing requires raw I2C mode");
		assert!(!data.is_empty() && data.len() <= BULK_WRITE_MAX, "bulk transfer is limited to 1..=16 bytes per frame");
		const CMD: &str = "bulk write";

		let mut frame = Vec::with_capacity(1 + data.len());
		frame.push(BULK_WRITE | (data.len() as u8 - 1));
		frame.extend_from_slice(data);
		self.write_command(CMD, &frame)?;

		self.expect_command_ack(CMD)?;
		let mut acks = vec![0u8; data.len()];
		self.read_exact(CMD, &mut acks)?;
		if let Some(index) = acks.iter().position(|&a| a != BULK_BYTE_ACKED) {
			return Err(ProtocolError::DeviceNacked { index });
		}
		Ok(())
	}

	/// Read one data byte from the device currently addressed for reading.
	pub fn read_byte(&mut self) -> Result<u8, ProtocolError> {
		assert_eq!(self.mode(), Mode::I2c, "I2C framing requires raw I2C mode");
		const CMD: &str = "read byte";
		self.write_command(CMD, &[READ_BYTE])?;
		let mut data = [0u8; 1];
		self.read_exact(CMD, &mut data)?;
		Ok(data[0])
	}

	/// Framed write: start, payload in bulk frames, stop.
	///
	/// A nacked byte is reported with its payload-relative index. On any
	/// error a stop bit is still attempted so the bus is not left inside a
	/// transaction.
	pub fn write_transaction(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
		assert!(!payload.is_empty(), "write transaction needs at least one byte");

		self.send_start()?;
		match self.write_transaction_body(payload) {
			Ok(()) => self.send_stop(),
			Err(e) => {
				let _ = self.send_stop();
				Err(e)
			}
		}
	}

	fn write_transaction_body(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
		for (i, chunk) in payload.chunks(BULK_WRITE_MAX).enumerate() {
			self.bulk_write(chunk).map_err(|e| match e {
				ProtocolError::DeviceNacked { index } => ProtocolError::DeviceNacked { index: i * BULK_WRITE_MAX + index },
				e => e,
			})?;
		}
		Ok(())
	}

	/// Framed read: start, write the address byte(s), then read `count`
	/// bytes acking each but the last, nack, stop.
	pub fn read_sequence(&mut self, address: &[u8], count: usize) -> Result<Vec<u8>, ProtocolError> {
		assert!(count >= 1, "read transaction needs at least one byte");

		self.send_start()?;
		match self.read_sequence_body(address, count) {
			Ok(data) => {
				self.send_stop()?;
				Ok(data)
			}
			Err(e) => {
				let _ = self.send_stop();
				Err(e)
			}
		}
	}

	fn read_sequence_body(&mut self, address: &[u8], count: usize) -> Result<Vec<u8>, ProtocolError> {
		self.bulk_write(address)?;
		let mut data = Vec::with_capacity(count);
		for i in 0..count {
			data.push(self.read_byte()?);
			if i + 1 < count {
				self.send_ack()?;
			} else {
				self.send_nack()?;
			}
		}
		Ok(data)
	}

	fn expect_command_ack(&mut self, command: &'static str) -> Result<(), ProtocolError> {
		let mut ack = [0u8; 1];
		self.read_exact(command, &mut ack)?;
		if ack[0] != COMMAND_ACK {
			return Err(ProtocolError::CommandNacked { command, response: ack[0] });
		}
		Ok(())
	}
}
