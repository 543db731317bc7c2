use std::fmt;
use std::str;

/// Peripheral switches of the adapter's I2C header.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PinConfig {
	pub power: bool,
	pub pullups: bool,
	pub aux: bool,
	pub chip_select: bool,
}

impl PinConfig {
	pub(crate) fn bits(&self) -> u8 {
		let mut bits = 0;
		if self.power {
			bits |= 0x08;
		}
		if self.pullups {
			bits |= 0x04;
		}
		if self.aux {
			bits |= 0x02;
		}
		if self.chip_select {
			bits |= 0x01;
		}
		bits
	}
}

/// I2C bus clock rates the adapter firmware offers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Speed {
	Khz5,
	Khz50,
	Khz100,
	Khz400,
}

impl Speed {
	pub(crate) fn code(&self) -> u8 {
		match self {
			Speed::Khz5 => 0x00,
			Speed::Khz50 => 0x01,
			Speed::Khz100 => 0x02,
			Speed::Khz400 => 0x03,
		}
	}
}

impl fmt::Display for Speed {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let khz = match self {
			Speed::Khz5 => 5,
			Speed::Khz50 => 50,
			Speed::Khz100 => 100,
			Speed::Khz400 => 400,
		};
		write!(f, "{} kHz", khz)
	}
}

impl str::FromStr for Speed {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"5" => Ok(Speed::Khz5),
			"50" => Ok(Speed::Khz50),
			"100" => Ok(Speed::Khz100),
			"400" => Ok(Speed::Khz400),
			_ => bail!("unsupported I2C bus speed {:?} (pick 5, 50, 100 or 400 kHz)", s),
		}
	}
}
