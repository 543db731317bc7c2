/// Binary protocol of the Bus Pirate serial-to-I2C adapter.
///
/// The adapter boots into a human-readable terminal. Writing `0x00` up to
/// twenty times switches it into the raw "bitbang" root mode, acknowledged
/// with the tag `BBIO1`. From there `0x02` selects the raw I2C submode,
/// acknowledged with `I2C1`, and `0x0F` returns to the terminal.
///
/// Inside raw I2C mode every command is a single opcode byte, generally
/// acknowledged with `0x01`:
/// - `0x02` / `0x03`: start / stop bit
/// - `0x04`: read one data byte (the byte itself is the response)
/// - `0x06` / `0x07`: generate an I2C ack / nack after a read
/// - `0x10 | (n-1)`: bulk write of n bytes (1..=16); the command ack is
///   followed by one ack byte per payload byte, `0x00` meaning the
///   downstream device acknowledged it
/// - `0x40 | flags`: peripheral configuration (power, pull-ups, aux, CS)
/// - `0x60 | code`: bus speed selection

mod config;
mod error;
mod i2c;
mod session;

pub use self::config::{
	PinConfig,
	Speed,
};

pub use self::error::ProtocolError;

pub use self::session::{
	AdapterSession,
	Mode,
};

pub use self::consts::BULK_WRITE_MAX;

pub(crate) mod consts {
	// bitbang root mode
	pub const BINARY_MODE_PROBE: u8 = 0x00;
	pub const BINARY_MODE_PROBES: usize = 20;
	pub const BINARY_MODE_TAG: &[u8] = b"BBIO1";
	pub const RESET_ADAPTER: u8 = 0x0f;

	// submode selection from the bitbang root
	pub const ENTER_I2C: u8 = 0x02;
	pub const I2C_MODE_TAG: &[u8] = b"I2C1";

	// raw I2C mode opcodes
	pub const START_BIT: u8 = 0x02;
	pub const STOP_BIT: u8 = 0x03;
	pub const READ_BYTE: u8 = 0x04;
	pub const SEND_ACK: u8 = 0x06;
	pub const SEND_NACK: u8 = 0x07;
	pub const BULK_WRITE: u8 = 0x10; // low nibble: byte count - 1
	pub const CFG_PINS: u8 = 0x40; // low nibble: peripheral flags
	pub const SET_SPEED: u8 = 0x60; // low two bits: speed code

	pub const COMMAND_ACK: u8 = 0x01;
	pub const BULK_BYTE_ACKED: u8 = 0x00;

	pub const BULK_WRITE_MAX: usize = 16;
}
