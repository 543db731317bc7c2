//! Scripted stand-in for a serial-attached Bus Pirate with a 24Cxx-style
//! EEPROM wired to its I2C header. Implements just enough of the binary
//! protocol for the session, framing and dump layers to run against, plus
//! a few injectable faults.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::buspirate::{
	AdapterSession,
	PinConfig,
	Speed,
};
use crate::transport::Transport;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SimMode {
	Terminal,
	Bitbang,
	I2c,
}

struct State {
	mode: SimMode,
	memory: Vec<u8>,
	pointer: usize,
	device_address: u8,
	address_width: usize,

	// bytes queued for the host to read
	rx: VecDeque<u8>,

	// bulk frame in progress
	bulk_remaining: usize,

	// I2C bus state
	expect_address: bool,
	selected: bool,
	reading: bool,
	offset_bytes_left: usize,
	offset_accum: usize,
	wrote_data: bool,
	// address probes to nack while the "write cycle" runs
	busy_nacks: usize,
	write_cycle_nacks: usize,

	// observations for assertions
	pointer_writes: Vec<usize>,
	saw_reset: bool,
	timeout_sets: usize,
	data_bytes_served: usize,

	// injectable faults
	garble_bitbang_tag: bool,
	garble_i2c_tag: bool,
	reject_config: bool,
	mute_reads_after: Option<usize>,
}

#[derive(Clone)]
pub struct SimAdapter(Rc<RefCell<State>>);

impl SimAdapter {
	pub fn new(memory: Vec<u8>) -> Self {
		assert!(!memory.is_empty());
		SimAdapter(Rc::new(RefCell::new(State {
			mode: SimMode::Terminal,
			memory,
			pointer: 0,
			device_address: 0xa0,
			address_width: 1,
			rx: VecDeque::new(),
			bulk_remaining: 0,
			expect_address: false,
			selected: false,
			reading: false,
			offset_bytes_left: 0,
			offset_accum: 0,
			wrote_data: false,
			busy_nacks: 0,
			write_cycle_nacks: 0,
			pointer_writes: Vec::new(),
			saw_reset: false,
			timeout_sets: 0,
			data_bytes_served: 0,
			garble_bitbang_tag: false,
			garble_i2c_tag: false,
			reject_config: false,
			mute_reads_after: None,
		})))
	}

	pub fn set_address_width(&self, width: usize) {
		assert!(width == 1 || width == 2);
		self.0.borrow_mut().address_width = width;
	}

	pub fn set_write_cycle_nacks(&self, nacks: usize) {
		self.0.borrow_mut().write_cycle_nacks = nacks;
	}

	pub fn garble_bitbang_tag(&self) {
		self.0.borrow_mut().garble_bitbang_tag = true;
	}

	pub fn garble_i2c_tag(&self) {
		self.0.borrow_mut().garble_i2c_tag = true;
	}

	pub fn reject_config(&self) {
		self.0.borrow_mut().reject_config = true;
	}

	/// Stop answering read-byte commands once `served` data bytes went out.
	pub fn mute_reads_after(&self, served: usize) {
		self.0.borrow_mut().mute_reads_after = Some(served);
	}

	pub fn saw_reset(&self) -> bool {
		self.0.borrow().saw_reset
	}

	pub fn timeout_sets(&self) -> usize {
		self.0.borrow().timeout_sets
	}

	/// In-chip offsets the host positioned the read/write pointer to.
	pub fn pointer_writes(&self) -> Vec<usize> {
		self.0.borrow().pointer_writes.clone()
	}

	pub fn memory(&self) -> Vec<u8> {
		self.0.borrow().memory.clone()
	}
}

impl Transport for SimAdapter {
	fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
		let mut state = self.0.borrow_mut();
		for &byte in data {
			feed(&mut state, byte);
		}
		Ok(())
	}

	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let mut state = self.0.borrow_mut();
		let mut n = 0;
		while n < buf.len() {
			match state.rx.pop_front() {
				Some(byte) => {
					buf[n] = byte;
					n += 1;
				}
				// an empty queue is the simulated read timeout
				None => break,
			}
		}
		Ok(n)
	}

	fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
		self.0.borrow_mut().timeout_sets += 1;
		Ok(())
	}
}

fn feed(state: &mut State, byte: u8) {
	if state.mode == SimMode::I2c && state.bulk_remaining > 0 {
		state.bulk_remaining -= 1;
		let ack = bus_byte(state, byte);
		state.rx.push_back(ack);
		return;
	}

	match state.mode {
		SimMode::Terminal | SimMode::Bitbang => match byte {
			0x00 => {
				state.mode = SimMode::Bitbang;
				let garble = state.garble_bitbang_tag;
				respond_tag(state, b"BBIO1", garble);
			}
			0x02 if state.mode == SimMode::Bitbang => {
				state.mode = SimMode::I2c;
				let garble = state.garble_i2c_tag;
				respond_tag(state, b"I2C1", garble);
			}
			0x0f if state.mode == SimMode::Bitbang => {
				state.mode = SimMode::Terminal;
				state.saw_reset = true;
			}
			_ => {}
		},
		SimMode::I2c => match byte {
			// back to the bitbang root
			0x00 => {
				state.mode = SimMode::Bitbang;
				let garble = state.garble_bitbang_tag;
				respond_tag(state, b"BBIO1", garble);
			}
			0x0f => {
				state.mode = SimMode::Terminal;
				state.saw_reset = true;
			}
			// start bit
			0x02 => {
				state.expect_address = true;
				state.selected = false;
				state.reading = false;
				state.rx.push_back(0x01);
			}
			// stop bit
			0x03 => {
				if state.wrote_data {
					state.busy_nacks = state.write_cycle_nacks;
					state.wrote_data = false;
				}
				state.expect_address = false;
				state.selected = false;
				state.rx.push_back(0x01);
			}
			// read one data byte
			0x04 => {
				if let Some(limit) = state.mute_reads_after {
					if state.data_bytes_served >= limit {
						return;
					}
				}
				let data = state.memory[state.pointer];
				state.pointer = (state.pointer + 1) % state.memory.len();
				state.data_bytes_served += 1;
				state.rx.push_back(data);
			}
			// host-generated ack/nack
			0x06 | 0x07 => state.rx.push_back(0x01),
			op if op & 0xf0 == 0x10 => {
				state.bulk_remaining = (op & 0x0f) as usize + 1;
				state.rx.push_back(0x01);
			}
			op if op & 0xf0 == 0x40 => {
				state.rx.push_back(if state.reject_config { 0x00 } else { 0x01 });
			}
			op if op & 0xfc == 0x60 => {
				state.rx.push_back(if state.reject_config { 0x00 } else { 0x01 });
			}
			_ => state.rx.push_back(0x00),
		},
	}
}

fn respond_tag(state: &mut State, tag: &[u8], garble: bool) {
	if garble {
		for _ in tag {
			state.rx.push_back(b'?');
		}
	} else {
		state.rx.extend(tag);
	}
}

/// One payload byte of a bulk frame, seen as I2C bus traffic. Returns the
/// per-byte ack (0x00) or nack (0x01).
fn bus_byte(state: &mut State, byte: u8) -> u8 {
	if state.expect_address {
		state.expect_address = false;
		if state.busy_nacks > 0 {
			state.busy_nacks -= 1;
			return 0x01;
		}
		if byte >> 1 != state.device_address >> 1 {
			return 0x01;
		}
		state.selected = true;
		state.reading = byte & 0x01 != 0;
		if !state.reading {
			state.offset_bytes_left = state.address_width;
			state.offset_accum = 0;
		}
		return 0x00;
	}

	if !state.selected || state.reading {
		return 0x01;
	}

	if state.offset_bytes_left > 0 {
		state.offset_accum = state.offset_accum << 8 | byte as usize;
		state.offset_bytes_left -= 1;
		if state.offset_bytes_left == 0 {
			state.pointer = state.offset_accum % state.memory.len();
			state.pointer_writes.push(state.pointer);
		}
		return 0x00;
	}

	let pointer = state.pointer;
	state.memory[pointer] = byte;
	state.pointer = (pointer + 1) % state.memory.len();
	state.wrote_data = true;
	0x00
}

/// A session already brought up into configured raw I2C mode, plus the
/// simulator handle for assertions and fault injection.
pub fn i2c_session(memory: Vec<u8>) -> (AdapterSession<SimAdapter>, SimAdapter) {
	let sim = SimAdapter::new(memory);
	let mut session = AdapterSession::new(sim.clone());
	session.enter_binary_mode().unwrap();
	session.enter_i2c_mode().unwrap();
	session.configure_pins(PinConfig { power: true, pullups: true, aux: false, chip_select: false }).unwrap();
	session.set_speed(Speed::Khz400).unwrap();
	(session, sim)
}
