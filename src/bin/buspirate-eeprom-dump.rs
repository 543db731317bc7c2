#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate buspirate_eeprom_dump;
use buspirate_eeprom_dump::*;

use std::fs;
use std::process::exit;
use std::time::Duration;

use buspirate_eeprom_dump::buspirate::{
	AdapterSession,
	PinConfig,
	Speed,
	BULK_WRITE_MAX,
};
use buspirate_eeprom_dump::eeprom::{
	AddressWidth,
	DumpRequest,
};
use buspirate_eeprom_dump::transport::SerialTransport;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_param_or<T>(matches: &clap::ArgMatches, name: &str, default: T) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	match matches.value_of(name) {
		None => Ok(default),
		Some(_) => get_param(matches, name),
	}
}

fn parse_device_address(s: &str) -> AResult<u8> {
	let parsed = if s.starts_with("0x") || s.starts_with("0X") {
		u8::from_str_radix(&s[2..], 16)
	} else {
		s.parse::<u8>()
	};
	let address = parsed.map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid device address {:?}", s);
		failure::Error::from(e.context(msg))
	})?;
	ensure!(address & 0x01 == 0, "device address must have the R/W bit clear: 0x{:02x}", address);
	Ok(address)
}

fn run_dump(session: &mut AdapterSession<SerialTransport>, request: &DumpRequest, rate: Speed, timeout: Duration) -> AResult<Vec<u8>> {
	info!("entering binary mode");
	session.enter_binary_mode()?;

	info!("entering raw I2C mode");
	session.enter_i2c_mode()?;

	info!("configuring I2C peripherals and bus speed");
	session.configure_pins(PinConfig { power: true, pullups: true, aux: false, chip_select: false })?;
	session.set_speed(rate)?;
	session.set_timeout(timeout);

	info!("dumping {} bytes from the EEPROM at 0x{:02x}", request.total_size, request.device_address);
	Ok(eeprom::dump(session, request)?)
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@arg OUTPUT: -o --output +required +takes_value "file the EEPROM image is written to")
		(@arg SIZE: -s --size +required +takes_value "number of bytes to dump from the chip")
		(@arg PORT: -p --("serial-port") +takes_value "serial port the adapter is attached to (default /dev/ttyUSB0)")
		(@arg BAUD: -S --("serial-speed") +takes_value "serial baud rate (default 115200)")
		(@arg BLOCK: -b --("block-size") +takes_value "bytes per read transaction, 1..=16 (default 16)")
		(@arg ADDRESS: -a --("device-address") +takes_value "I2C device address with the R/W bit clear (default 0xa0)")
		(@arg WIDTH: -w --("address-width") +takes_value "in-chip address width in bytes, 1 or 2 (default 1)")
		(@arg RATE: -r --rate +takes_value "I2C bus speed in kHz: 5, 50, 100 or 400 (default 400)")
		(@arg TIMEOUT: -t --timeout +takes_value "response read timeout in milliseconds (default 250)")
	).get_matches();

	let output: String = get_param(&matches, "OUTPUT")?;
	let size: usize = get_param(&matches, "SIZE")?;
	let port: String = get_param_or(&matches, "PORT", "/dev/ttyUSB0".to_string())?;
	let baud: u32 = get_param_or(&matches, "BAUD", 115_200)?;
	let block_size: usize = get_param_or(&matches, "BLOCK", 16)?;
	let address = parse_device_address(matches.value_of("ADDRESS").unwrap_or("0xa0"))?;
	let width: AddressWidth = get_param_or(&matches, "WIDTH", AddressWidth::One)?;
	let rate: Speed = get_param_or(&matches, "RATE", Speed::Khz400)?;
	let timeout_ms: u64 = get_param_or(&matches, "TIMEOUT", 250)?;
	let timeout = Duration::from_millis(timeout_ms);

	ensure!(size > 0, "dump size must be at least one byte");
	ensure!(block_size >= 1 && block_size <= BULK_WRITE_MAX, "block size must be between 1 and {}", BULK_WRITE_MAX);
	ensure!(size <= width.max_size(), "{} bytes exceed the {} byte range addressable with this address width", size, width.max_size());

	let request = DumpRequest {
		device_address: address,
		address_width: width,
		total_size: size,
		block_size,
	};

	let transport = transport::open_serial(&port, baud, timeout)?;
	let mut session = AdapterSession::new(transport);

	let image = match run_dump(&mut session, &request, rate, timeout) {
		Ok(image) => image,
		Err(e) => {
			// leave the adapter in its terminal even when setup failed
			// (dump failures have already reset it)
			if let Err(re) = session.reset() {
				warn!("adapter reset after failure also failed: {}", re);
			}
			return Err(e);
		}
	};

	fs::write(&output, &image).map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("couldn't write image to {}", output);
		failure::Error::from(e.context(msg))
	})?;
	info!("wrote {} bytes to {}", image.len(), output);

	info!("resetting adapter to user terminal");
	session.reset()?;

	Ok(())
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
