use std::cmp::min;
use std::str;

use failure::Fail;

use crate::buspirate::{
	AdapterSession,
	ProtocolError,
	BULK_WRITE_MAX,
};
use crate::transport::Transport;

// I2C read/write direction bit in the device address byte
const READ_BIT: u8 = 0x01;

// address probes to spend waiting out an EEPROM's internal write cycle
const WRITE_CYCLE_POLLS: usize = 50;

/// In-chip offset width of the EEPROM.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum AddressWidth {
	One,
	Two,
}

impl AddressWidth {
	pub fn max_size(&self) -> usize {
		match self {
			AddressWidth::One => 1 << 8,
			AddressWidth::Two => 1 << 16,
		}
	}

	fn push_offset(&self, offset: usize, frame: &mut Vec<u8>) {
		match self {
			AddressWidth::One => frame.push(offset as u8),
			AddressWidth::Two => {
				frame.push((offset >> 8) as u8);
				frame.push(offset as u8);
			}
		}
	}
}

impl str::FromStr for AddressWidth {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"1" => Ok(AddressWidth::One),
			"2" => Ok(AddressWidth::Two),
			_ => bail!("EEPROM address width must be 1 or 2 bytes, not {:?}", s),
		}
	}
}

/// One linear dump of a chip's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DumpRequest {
	/// Device address with the R/W bit clear, e.g. 0xa0.
	pub device_address: u8,
	pub address_width: AddressWidth,
	/// Bytes to read in total.
	pub total_size: usize,
	/// Bytes per read transaction, 1..=16 (adapter bulk transfer limit).
	pub block_size: usize,
}

/// One write of a byte pattern into the chip.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramRequest {
	/// Device address with the R/W bit clear, e.g. 0xa0.
	pub device_address: u8,
	pub address_width: AddressWidth,
	/// The chip's write page size, 1..=16.
	pub page_size: usize,
	/// In-chip offset the data starts at.
	pub offset: usize,
}

#[derive(Debug, Fail)]
pub enum DumpError {
	#[fail(display = "I2C protocol failure in block {}: {}", block, source)]
	Protocol {
		block: usize,
		#[fail(cause)]
		source: ProtocolError,
	},
}

/// Read `request.total_size` bytes off the chip, block by block.
///
/// Each block positions the chip's internal read pointer with a framed
/// write, then reads the block with a framed sequential read. The result
/// is a byte-exact linear image of the chip in address order. Any protocol
/// error aborts the whole dump (no partial result) after a best-effort
/// adapter reset; retrying is the caller's call.
pub fn dump<T: Transport>(session: &mut AdapterSession<T>, request: &DumpRequest) -> Result<Vec<u8>, DumpError> {
	assert!(request.block_size >= 1 && request.block_size <= BULK_WRITE_MAX, "block size must be within the adapter bulk transfer limit");
	assert_eq!(request.device_address & READ_BIT, 0, "device address must have the R/W bit clear");
	assert!(request.total_size <= request.address_width.max_size(), "dump exceeds the addressable range");

	let read_address = [request.device_address | READ_BIT];
	let mut image = Vec::with_capacity(request.total_size);

	let mut offset = 0;
	let mut block = 0;
	while offset < request.total_size {
		let count = min(request.block_size, request.total_size - offset);
		trace!("block {}: {} bytes at 0x{:04x}", block, count, offset);

		let data = set_read_pointer(session, request.device_address, request.address_width, offset)
			.and_then(|()| session.read_sequence(&read_address, count))
			.map_err(|e| abort(session, block, e))?;
		image.extend_from_slice(&data);

		offset += count;
		block += 1;
	}

	Ok(image)
}

/// Write `data` into the chip starting at `request.offset`.
///
/// Data is split on the chip's page boundaries; between pages the device
/// is address-polled until it acknowledges again, since an EEPROM nacks
/// everything for the duration of its internal write cycle. This is the
/// caller-level retry of `DeviceNacked` that the framing layer itself
/// never performs.
pub fn program<T: Transport>(session: &mut AdapterSession<T>, request: &ProgramRequest, data: &[u8]) -> Result<(), DumpError> {
	assert!(request.page_size >= 1 && request.page_size <= BULK_WRITE_MAX, "page size must be within the adapter bulk transfer limit");
	assert_eq!(request.device_address & READ_BIT, 0, "device address must have the R/W bit clear");
	assert!(request.offset + data.len() <= request.address_width.max_size(), "write exceeds the addressable range");

	let mut offset = request.offset;
	let mut remaining = data;
	let mut page = 0;
	while !remaining.is_empty() {
		let take = min(request.page_size - offset % request.page_size, remaining.len());
		let (chunk, rest) = remaining.split_at(take);
		trace!("page {}: {} bytes at 0x{:04x}", page, take, offset);

		let mut frame = Vec::with_capacity(3 + take);
		frame.push(request.device_address);
		request.address_width.push_offset(offset, &mut frame);
		frame.extend_from_slice(chunk);

		poll_write_cycle(session, request.device_address)
			.and_then(|()| session.write_transaction(&frame))
			.map_err(|e| abort(session, page, e))?;

		offset += take;
		remaining = rest;
		page += 1;
	}

	// leave the device idle, not mid write cycle
	poll_write_cycle(session, request.device_address).map_err(|e| abort(session, page, e))
}

fn set_read_pointer<T: Transport>(
	session: &mut AdapterSession<T>,
	device_address: u8,
	address_width: AddressWidth,
	offset: usize,
) -> Result<(), ProtocolError> {
	let mut frame = Vec::with_capacity(3);
	frame.push(device_address);
	address_width.push_offset(offset, &mut frame);
	session.write_transaction(&frame)
}

fn poll_write_cycle<T: Transport>(session: &mut AdapterSession<T>, device_address: u8) -> Result<(), ProtocolError> {
	let mut last = Ok(());
	for _ in 0..WRITE_CYCLE_POLLS {
		match session.write_transaction(&[device_address]) {
			Ok(()) => return Ok(()),
			// still in its write cycle, probe again
			Err(e @ ProtocolError::DeviceNacked { .. }) => last = Err(e),
			Err(e) => return Err(e),
		}
	}
	last
}

fn abort<T: Transport>(session: &mut AdapterSession<T>, block: usize, source: ProtocolError) -> DumpError {
	if let Err(e) = session.reset() {
		warn!("adapter reset after aborted transfer also failed: {}", e);
	}
	DumpError::Protocol { block, source }
}
