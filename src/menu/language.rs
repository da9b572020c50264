//! Supported menu languages and localized weekday names.

// crates.io
use time::Weekday;
// self
use crate::_prelude::*;

/// Weekday names indexed by ISO weekday (1 = Monday); index 0 is unused.
type WeekdayTable = [&'static str; 8];

const SWEDISH_DAYS: WeekdayTable =
	["", "Måndag", "Tisdag", "Onsdag", "Torsdag", "Fredag", "Lördag", "Söndag"];
const ENGLISH_DAYS: WeekdayTable =
	["", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const FINNISH_DAYS: WeekdayTable = [
	"",
	"Maanantai",
	"Tiistai",
	"Keskiviikko",
	"Torstai",
	"Perjantai",
	"Lauantai",
	"Sunnuntai",
];

/// Languages the upstream publishes menus in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
	/// Swedish.
	Sv,
	/// English; also the fallback for unknown codes.
	#[default]
	En,
	/// Finnish.
	Fi,
}
impl Language {
	/// Every supported language.
	pub const ALL: [Language; 3] = [Language::Sv, Language::En, Language::Fi];

	/// Recognizes canonical codes and common aliases, case-insensitively.
	pub fn parse(code: &str) -> Option<Self> {
		match code.trim().to_ascii_lowercase().as_str() {
			"sv" | "swe" | "se" | "sve" | "svenska" | "swedish" => Some(Self::Sv),
			"en" | "eng" | "english" => Some(Self::En),
			"fi" | "fin" | "suomi" | "finnish" => Some(Self::Fi),
			_ => None,
		}
	}

	/// Normalizes any code, defaulting to English when it is not recognized.
	pub fn from_code(code: &str) -> Self {
		Self::parse(code).unwrap_or_default()
	}

	/// Canonical two-letter code.
	pub const fn code(self) -> &'static str {
		match self {
			Self::Sv => "sv",
			Self::En => "en",
			Self::Fi => "fi",
		}
	}

	/// Localized name of `weekday`.
	pub fn weekday_name(self, weekday: Weekday) -> &'static str {
		let table = match self {
			Self::Sv => &SWEDISH_DAYS,
			Self::En => &ENGLISH_DAYS,
			Self::Fi => &FINNISH_DAYS,
		};

		table[usize::from(weekday.number_from_monday())]
	}
}
impl Display for Language {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.code())
	}
}
impl FromStr for Language {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::from_code(s))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn aliases_normalize_to_canonical_codes() {
		assert_eq!(Language::from_code("SWE"), Language::Sv);
		assert_eq!(Language::from_code("fin"), Language::Fi);
		assert_eq!(Language::from_code(" en "), Language::En);
		assert_eq!(Language::from_code("de"), Language::En);
		assert_eq!(Language::parse("de"), None);
	}

	#[test]
	fn weekday_names_follow_iso_numbering() {
		assert_eq!(Language::En.weekday_name(Weekday::Monday), "Monday");
		assert_eq!(Language::Sv.weekday_name(Weekday::Saturday), "Lördag");
		assert_eq!(Language::Fi.weekday_name(Weekday::Sunday), "Sunnuntai");

		for language in Language::ALL {
			assert!(!language.weekday_name(Weekday::Wednesday).is_empty());
		}
	}
}
