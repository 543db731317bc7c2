use std::time::Duration;

use crate::transport::Transport;

use super::consts::*;
use super::{
	PinConfig,
	ProtocolError,
	Speed,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Adapter protocol mode. Advances monotonically forward during setup;
/// `reset` is the only way back.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Mode {
	Uninitialized,
	Binary,
	I2c,
}

/// Exclusive owner of the transport to one adapter.
///
/// The protocol is strictly request/response: every command consumes all of
/// its expected response bytes before the next command is issued, so a
/// failed command never leaves stale bytes for its successor.
pub struct AdapterSession<T: Transport> {
	transport: T,
	mode: Mode,
	speed: Option<Speed>,
	timeout: Duration,
	timeout_dirty: bool,
}

impl<T: Transport> AdapterSession<T> {
	pub fn new(transport: T) -> Self {
		AdapterSession {
			transport,
			mode: Mode::Uninitialized,
			speed: None,
			timeout: DEFAULT_TIMEOUT,
			timeout_dirty: true,
		}
	}

	pub fn mode(&self) -> Mode {
		self.mode
	}

	pub fn speed(&self) -> Option<Speed> {
		self.speed
	}

	/// Switch the adapter from its terminal into the raw binary protocol.
	///
	/// The adapter may need several probe bytes before it reacts, and may
	/// emit leftover terminal output first, so the acknowledgement tag is
	/// searched at the end of everything received.
	pub fn enter_binary_mode(&mut self) -> Result<(), ProtocolError> {
		assert_eq!(self.mode, Mode::Uninitialized, "binary mode entry is only valid on a fresh session");
		const CMD: &str = "enter binary mode";

		self.drain(CMD)?;

		let mut seen = Vec::new();
		for _ in 0..BINARY_MODE_PROBES {
			self.write_command(CMD, &[BINARY_MODE_PROBE])?;
			let mut buf = [0u8; 5];
			let n = self.read_available(CMD, &mut buf)?;
			seen.extend_from_slice(&buf[..n]);
			if seen.ends_with(BINARY_MODE_TAG) {
				self.mode = Mode::Binary;
				debug!("adapter entered binary mode");
				return Ok(());
			}
		}

		Err(ProtocolError::ModeEntryFailed { response: seen })
	}

	/// Select the raw I2C submode and verify the protocol tag.
	pub fn enter_i2c_mode(&mut self) -> Result<(), ProtocolError> {
		assert_eq!(self.mode, Mode::Binary, "raw I2C mode is entered from binary mode");
		const CMD: &str = "enter raw I2C mode";

		self.write_command(CMD, &[ENTER_I2C])?;
		let tag = self.read_upto(CMD, I2C_MODE_TAG.len())?;
		if tag != I2C_MODE_TAG {
			return Err(ProtocolError::SubmodeMismatch { response: tag });
		}

		self.mode = Mode::I2c;
		debug!("adapter entered raw I2C mode");
		Ok(())
	}

	/// Configure adapter peripherals (power supplies, pull-ups, ...).
	pub fn configure_pins(&mut self, pins: PinConfig) -> Result<(), ProtocolError> {
		assert_eq!(self.mode, Mode::I2c, "peripheral configuration requires raw I2C mode");
		const CMD: &str = "configure pins";

		self.write_command(CMD, &[CFG_PINS | pins.bits()])?;
		self.expect_config_ack(CMD)
	}

	/// Select the I2C bus clock rate.
	pub fn set_speed(&mut self, speed: Speed) -> Result<(), ProtocolError> {
		assert_eq!(self.mode, Mode::I2c, "speed configuration requires raw I2C mode");
		const CMD: &str = "set bus speed";

		self.write_command(CMD, &[SET_SPEED | speed.code()])?;
		self.expect_config_ack(CMD)?;
		self.speed = Some(speed);
		debug!("bus speed configured: {}", speed);
		Ok(())
	}

	/// Change the response read timeout. Purely local: the transport is
	/// only reconfigured on the next read.
	pub fn set_timeout(&mut self, timeout: Duration) {
		self.timeout = timeout;
		self.timeout_dirty = true;
	}

	/// Best-effort teardown: leave raw I2C, then reset the adapter back to
	/// its user terminal. Idempotent, so both the success and the failure
	/// path may call it.
	pub fn reset(&mut self) -> Result<(), ProtocolError> {
		if self.mode == Mode::Uninitialized {
			return Ok(());
		}
		const CMD: &str = "reset adapter";

		self.drain(CMD)?;
		self.write_command(CMD, &[BINARY_MODE_PROBE])?;
		self.drain(CMD)?;
		self.write_command(CMD, &[RESET_ADAPTER])?;
		self.drain(CMD)?;

		self.mode = Mode::Uninitialized;
		self.speed = None;
		debug!("adapter reset to user terminal");
		Ok(())
	}

	fn expect_config_ack(&mut self, command: &'static str) -> Result<(), ProtocolError> {
		let response = self.read_upto(command, 1)?;
		match response.first() {
			Some(&COMMAND_ACK) => Ok(()),
			Some(&other) => Err(ProtocolError::ConfigRejected { command, response: Some(other) }),
			None => Err(ProtocolError::ConfigRejected { command, response: None }),
		}
	}

	pub(crate) fn write_command(&mut self, command: &'static str, bytes: &[u8]) -> Result<(), ProtocolError> {
		self.transport.write_all(bytes).map_err(|cause| ProtocolError::Io { command, cause })
	}

	/// Read exactly `buf.len()` response bytes within the timeout.
	pub(crate) fn read_exact(&mut self, command: &'static str, buf: &mut [u8]) -> Result<(), ProtocolError> {
		self.apply_timeout(command)?;
		let mut filled = 0;
		while filled < buf.len() {
			let n = self.transport.read(&mut buf[filled..]).map_err(|cause| ProtocolError::Io { command, cause })?;
			if n == 0 {
				return Err(ProtocolError::ReadTimeout { command });
			}
			filled += n;
		}
		Ok(())
	}

	/// Collect up to `want` response bytes, stopping early on timeout.
	fn read_upto(&mut self, command: &'static str, want: usize) -> Result<Vec<u8>, ProtocolError> {
		let mut buf = vec![0u8; want];
		let mut filled = 0;
		while filled < want {
			let n = self.read_available(command, &mut buf[filled..])?;
			if n == 0 {
				break;
			}
			filled += n;
		}
		buf.truncate(filled);
		Ok(buf)
	}

	fn read_available(&mut self, command: &'static str, buf: &mut [u8]) -> Result<usize, ProtocolError> {
		self.apply_timeout(command)?;
		self.transport.read(buf).map_err(|cause| ProtocolError::Io { command, cause })
	}

	/// Discard whatever the adapter still has queued for us.
	fn drain(&mut self, command: &'static str) -> Result<(), ProtocolError> {
		let mut scratch = [0u8; 64];
		while self.read_available(command, &mut scratch)? > 0 {}
		Ok(())
	}

	fn apply_timeout(&mut self, command: &'static str) -> Result<(), ProtocolError> {
		if self.timeout_dirty {
			self.transport.set_timeout(self.timeout).map_err(|cause| ProtocolError::Io { command, cause })?;
			self.timeout_dirty = false;
		}
		Ok(())
	}
}
