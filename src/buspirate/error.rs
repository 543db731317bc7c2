use std::io;

use failure::Fail;

/// Failures talking to the adapter over the serial command channel.
///
/// All of these are recoverable at the process level; retry policy is left
/// to the caller.
#[derive(Debug, Fail)]
pub enum ProtocolError {
	#[fail(display = "adapter did not acknowledge binary mode entry (got {:?})", response)]
	ModeEntryFailed { response: Vec<u8> },

	#[fail(display = "adapter reported an unexpected protocol tag for raw I2C mode (got {:?})", response)]
	SubmodeMismatch { response: Vec<u8> },

	#[fail(display = "adapter rejected {} (response {:?})", command, response)]
	ConfigRejected { command: &'static str, response: Option<u8> },

	#[fail(display = "adapter did not acknowledge {} (response 0x{:02x})", command, response)]
	CommandNacked { command: &'static str, response: u8 },

	#[fail(display = "device nacked byte {} of a bulk write", index)]
	DeviceNacked { index: usize },

	#[fail(display = "timed out waiting for the adapter response to {}", command)]
	ReadTimeout { command: &'static str },

	#[fail(display = "transport failure during {}: {}", command, cause)]
	Io {
		command: &'static str,
		#[fail(cause)]
		cause: io::Error,
	},
}
