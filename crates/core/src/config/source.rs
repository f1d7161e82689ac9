//! Key/value configuration sources.

use std::collections::HashMap;
use std::fs;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

use tracing::debug;

use crate::error::ConfigError;

/// Default environment variable prefix used by [`EnvSource`].
pub const DEFAULT_ENV_PREFIX: &str = "DEVSESS_";

/// A read-only key/value lookup.
pub trait ConfigSource: Send + Sync {
	/// Returns the raw value stored under `key`, if any.
	fn get(&self, key: &str) -> Option<String>;

	/// Short human description used in logs.
	fn describe(&self) -> String;
}

/// In-memory source.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
	entries: HashMap<String, String>,
}

impl MapSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.entries.insert(key.into(), value.into());
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.entries.insert(key.into(), value.into());
	}

	pub fn remove(&mut self, key: &str) -> Option<String> {
		self.entries.remove(key)
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}
}

impl ConfigSource for MapSource {
	fn get(&self, key: &str) -> Option<String> {
		self.entries.get(key).cloned()
	}

	fn describe(&self) -> String {
		format!("map ({} keys)", self.entries.len())
	}
}

/// Java-style `.properties` file, read with the `java.util.Properties` load
/// grammar.
///
/// Keys end at the first unescaped `=`, `:` or whitespace. Lines starting
/// with `#` or `!` are comments. A line ending in an odd number of
/// backslashes continues on the next line, minus its leading whitespace.
/// Escapes (`\:`, `\=`, `\ `, `\\`, `\t`, `\n`, `\uXXXX`) are decoded in
/// keys and values. Later duplicates win.
#[derive(Debug, Clone)]
pub struct PropertiesSource {
	path: Option<PathBuf>,
	entries: HashMap<String, String>,
}

impl PropertiesSource {
	/// Loads and parses a properties file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let mut parsed = Self::parse(&text);
		debug!(target = "devsess.config", path = %path.display(), keys = parsed.entries.len(), "loaded properties file");
		parsed.path = Some(path.to_path_buf());
		Ok(parsed)
	}

	/// Parses properties text.
	pub fn parse(text: &str) -> Self {
		let entries = logical_lines(text).iter().map(|line| split_entry(line)).collect();
		Self { path: None, entries }
	}
}

const PROPERTIES_WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

/// Joins continued lines and drops comments and blank lines. Escapes are
/// left in place for [`split_entry`].
fn logical_lines(text: &str) -> Vec<String> {
	let mut lines = Vec::new();
	let mut pending: Option<String> = None;
	for natural in text.lines() {
		let line = natural.trim_start_matches(PROPERTIES_WHITESPACE);
		let mut logical = match pending.take() {
			Some(logical) => logical,
			None if line.is_empty() || line.starts_with(['#', '!']) => continue,
			None => String::new(),
		};
		let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
		if trailing % 2 == 1 {
			logical.push_str(&line[..line.len() - 1]);
			pending = Some(logical);
		} else {
			logical.push_str(line);
			lines.push(logical);
		}
	}
	lines.extend(pending);
	lines
}

fn split_entry(line: &str) -> (String, String) {
	let mut chars = line.chars().peekable();
	let mut key = String::new();
	while let Some(c) = chars.next_if(|&c| !matches!(c, '=' | ':') && !PROPERTIES_WHITESPACE.contains(&c)) {
		if c == '\\' {
			unescape(&mut chars, &mut key);
		} else {
			key.push(c);
		}
	}

	while chars.next_if(|c| PROPERTIES_WHITESPACE.contains(c)).is_some() {}
	if chars.next_if(|&c| matches!(c, '=' | ':')).is_some() {
		while chars.next_if(|c| PROPERTIES_WHITESPACE.contains(c)).is_some() {}
	}

	let mut value = String::new();
	while let Some(c) = chars.next() {
		if c == '\\' {
			unescape(&mut chars, &mut value);
		} else {
			value.push(c);
		}
	}
	(key, value)
}

/// Decodes the escape following a backslash. Malformed `\u` sequences are
/// kept verbatim.
fn unescape(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
	match chars.next() {
		Some('t') => out.push('\t'),
		Some('n') => out.push('\n'),
		Some('r') => out.push('\r'),
		Some('f') => out.push('\x0c'),
		Some('u') => {
			let hex: String = (0..4).map_while(|_| chars.next_if(char::is_ascii_hexdigit)).collect();
			let decoded = (hex.len() == 4)
				.then(|| u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32))
				.flatten();
			match decoded {
				Some(c) => out.push(c),
				None => {
					out.push_str("\\u");
					out.push_str(&hex);
				}
			}
		}
		Some(other) => out.push(other),
		None => {}
	}
}

impl ConfigSource for PropertiesSource {
	fn get(&self, key: &str) -> Option<String> {
		self.entries.get(key).cloned()
	}

	fn describe(&self) -> String {
		match &self.path {
			Some(path) => format!("properties file {}", path.display()),
			None => "properties".to_string(),
		}
	}
}

/// Process environment, with keys mapped to prefixed SCREAMING_SNAKE_CASE.
///
/// `implicitTimeoutSeconds` is read from `DEVSESS_IMPLICIT_TIMEOUT_SECONDS`,
/// `deviceUDID` from `DEVSESS_DEVICE_UDID`.
#[derive(Debug, Clone)]
pub struct EnvSource {
	prefix: String,
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::with_prefix(DEFAULT_ENV_PREFIX)
	}
}

impl EnvSource {
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self { prefix: prefix.into() }
	}

	/// Environment variable name for a configuration key.
	pub fn var_name(&self, key: &str) -> String {
		let mut name = self.prefix.clone();
		let mut prev_lower = false;
		for ch in key.chars() {
			if ch.is_ascii_uppercase() && prev_lower {
				name.push('_');
			}
			prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
			name.push(ch.to_ascii_uppercase());
		}
		name
	}
}

impl ConfigSource for EnvSource {
	fn get(&self, key: &str) -> Option<String> {
		std::env::var(self.var_name(key)).ok()
	}

	fn describe(&self) -> String {
		format!("environment ({}*)", self.prefix)
	}
}

/// Ordered stack of sources; the first layer holding a non-blank value for a
/// key wins.
#[derive(Default)]
pub struct LayeredSource {
	layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a lower-precedence layer.
	pub fn push(mut self, source: impl ConfigSource + 'static) -> Self {
		self.layers.push(Box::new(source));
		self
	}

	pub fn len(&self) -> usize {
		self.layers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.layers.is_empty()
	}
}

impl ConfigSource for LayeredSource {
	fn get(&self, key: &str) -> Option<String> {
		self.layers
			.iter()
			.find_map(|layer| layer.get(key).filter(|value| !value.trim().is_empty()))
	}

	fn describe(&self) -> String {
		let names: Vec<String> = self.layers.iter().map(|l| l.describe()).collect();
		names.join(" > ")
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn properties_parse_handles_separators_and_comments() {
		let props = PropertiesSource::parse(
			"# appium settings\n\
			 ! legacy comment\n\
			 \n\
			 platformName = Android\n\
			 deviceName:Pixel 7\n\
			 url=http://127.0.0.1:4723/wd/hub\n\
			 deviceUDID=\n",
		);
		assert_eq!(props.get("platformName").as_deref(), Some("Android"));
		assert_eq!(props.get("deviceName").as_deref(), Some("Pixel 7"));
		assert_eq!(props.get("url").as_deref(), Some("http://127.0.0.1:4723/wd/hub"));
		assert_eq!(props.get("deviceUDID").as_deref(), Some(""));
		assert!(props.get("# appium settings").is_none());
	}

	#[test]
	fn properties_value_keeps_later_separators() {
		let props = PropertiesSource::parse("url=http://host:4723/wd/hub");
		assert_eq!(props.get("url").as_deref(), Some("http://host:4723/wd/hub"));
	}

	#[test]
	fn properties_decode_escaped_separators() {
		let props = PropertiesSource::parse("url=http\\://127.0.0.1\\:4723/wd/hub\napp\\ name=C\\:\\\\apps\\\\cat.apk\n");
		assert_eq!(props.get("url").as_deref(), Some("http://127.0.0.1:4723/wd/hub"));
		assert_eq!(props.get("app name").as_deref(), Some("C:\\apps\\cat.apk"));
	}

	#[test]
	fn properties_accept_whitespace_separator() {
		let props = PropertiesSource::parse("deviceName Pixel_7\n\tplatformName\t  iOS\nappActivity  =  .Main\nbare\n");
		assert_eq!(props.get("deviceName").as_deref(), Some("Pixel_7"));
		assert_eq!(props.get("platformName").as_deref(), Some("iOS"));
		assert_eq!(props.get("appActivity").as_deref(), Some(".Main"));
		assert_eq!(props.get("bare").as_deref(), Some(""));
	}

	#[test]
	fn properties_join_continuation_lines() {
		let props = PropertiesSource::parse(
			"url=http://127.0.0.1:4723\\\n    /wd/hub\n\
			 # comment ending in a backslash \\\n\
			 deviceName=emulator\n\
			 literal=ends with \\\\\n\
			 next=value\n",
		);
		assert_eq!(props.get("url").as_deref(), Some("http://127.0.0.1:4723/wd/hub"));
		assert_eq!(props.get("deviceName").as_deref(), Some("emulator"));
		assert_eq!(props.get("literal").as_deref(), Some("ends with \\"));
		assert_eq!(props.get("next").as_deref(), Some("value"));
	}

	#[test]
	fn properties_decode_unicode_escapes() {
		let props = PropertiesSource::parse("deviceName=Pixel\\u0020\\u00e9\nbroken=\\u12\n");
		assert_eq!(props.get("deviceName").as_deref(), Some("Pixel \u{e9}"));
		assert_eq!(props.get("broken").as_deref(), Some("\\u12"));
	}

	#[test]
	fn properties_from_file_reports_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let err = PropertiesSource::from_file(dir.path().join("absent.properties")).unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }));
	}

	#[test]
	fn properties_from_file_reads_entries() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("appium.properties");
		let mut file = std::fs::File::create(&path).unwrap();
		writeln!(file, "maxRetries=2").unwrap();
		drop(file);

		let props = PropertiesSource::from_file(&path).unwrap();
		assert_eq!(props.get("maxRetries").as_deref(), Some("2"));
		assert!(props.describe().contains("appium.properties"));
	}

	#[test]
	fn env_var_names_are_screaming_snake() {
		let env = EnvSource::default();
		assert_eq!(env.var_name("implicitTimeoutSeconds"), "DEVSESS_IMPLICIT_TIMEOUT_SECONDS");
		assert_eq!(env.var_name("deviceUDID"), "DEVSESS_DEVICE_UDID");
		assert_eq!(env.var_name("appAbsolutePath"), "DEVSESS_APP_ABSOLUTE_PATH");
		assert_eq!(env.var_name("url"), "DEVSESS_URL");
		assert_eq!(EnvSource::with_prefix("APPIUM_").var_name("maxRetries"), "APPIUM_MAX_RETRIES");
	}

	#[test]
	fn layered_source_prefers_earlier_layers() {
		let layered = LayeredSource::new()
			.push(MapSource::new().with("maxRetries", "5"))
			.push(MapSource::new().with("maxRetries", "1").with("url", "http://fallback"));
		assert_eq!(layered.len(), 2);
		assert_eq!(layered.get("maxRetries").as_deref(), Some("5"));
		assert_eq!(layered.get("url").as_deref(), Some("http://fallback"));
		assert!(layered.get("deviceName").is_none());
	}

	#[test]
	fn layered_source_skips_blank_values() {
		let layered = LayeredSource::new()
			.push(MapSource::new().with("url", "").with("deviceName", "  "))
			.push(PropertiesSource::parse("url=http://h:4723\ndeviceName=Pixel_7\n"));
		assert_eq!(layered.get("url").as_deref(), Some("http://h:4723"));
		assert_eq!(layered.get("deviceName").as_deref(), Some("Pixel_7"));

		let only_blank = LayeredSource::new().push(MapSource::new().with("url", " "));
		assert!(only_blank.get("url").is_none());
	}
}
