//! Core protocol types used across the wire.

use serde::{Deserialize, Serialize};

/// Mobile platform a device session targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
	/// Android device or emulator
	Android,
	/// iOS device or simulator
	#[serde(rename = "iOS")]
	Ios,
}

impl Platform {
	/// Returns the `platformName` capability value.
	pub fn as_str(&self) -> &'static str {
		match self {
			Platform::Android => "Android",
			Platform::Ios => "iOS",
		}
	}
}

impl std::fmt::Display for Platform {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Platform {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"android" => Ok(Platform::Android),
			"ios" => Ok(Platform::Ios),
			_ => Err(format!("unknown platform: {s}")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn platform_parses_case_insensitively() {
		assert_eq!("Android".parse::<Platform>().unwrap(), Platform::Android);
		assert_eq!("ANDROID".parse::<Platform>().unwrap(), Platform::Android);
		assert_eq!(" ios ".parse::<Platform>().unwrap(), Platform::Ios);
		assert_eq!("iOS".parse::<Platform>().unwrap(), Platform::Ios);
		assert!("windows".parse::<Platform>().is_err());
	}

	#[test]
	fn platform_serializes_as_capability_value() {
		assert_eq!(serde_json::to_string(&Platform::Ios).unwrap(), "\"iOS\"");
		assert_eq!(serde_json::to_string(&Platform::Android).unwrap(), "\"Android\"");
	}
}
