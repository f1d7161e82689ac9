//! Configuration problems abort a run before any device connection.

use std::io::Write;

use devsess::config::keys;
use devsess::testing::FakeEndpoint;
use devsess::{ConfigError, LayeredSource, MapSource, PropertiesSource, SessionSupervisor, SupervisorError};
use devsess_protocol::Platform;

const ANDROID_PROPERTIES: &str = "\
# device under test
platformName = Android
deviceName = Pixel_7
appAbsolutePath = /builds/app-debug.apk
appPackage = com.example.shop
appActivity = .MainActivity
url = http://127.0.0.1:4723/wd/hub
implicitTimeoutSeconds = 15
maxRetries = 2
";

#[test]
fn android_without_app_identity_fails_before_connecting() {
	let endpoint = FakeEndpoint::new();
	let source = MapSource::new()
		.with(keys::PLATFORM_NAME, "Android")
		.with(keys::DEVICE_NAME, "Pixel_7")
		.with(keys::APP_PATH, "/builds/app.apk")
		.with(keys::URL, "http://127.0.0.1:4723")
		.with(keys::IMPLICIT_TIMEOUT, "10")
		.with(keys::MAX_RETRIES, "1");

	let err = SessionSupervisor::from_source(&source, endpoint.clone()).unwrap_err();

	assert!(matches!(
		err,
		SupervisorError::Config(ConfigError::PlatformMismatch {
			platform: Platform::Android,
			..
		})
	));
	assert_eq!(endpoint.open_calls(), 0);
}

#[test]
fn ios_with_app_package_fails_before_connecting() {
	let endpoint = FakeEndpoint::new();
	let source = MapSource::new()
		.with(keys::PLATFORM_NAME, "iOS")
		.with(keys::DEVICE_NAME, "iPhone 15")
		.with(keys::APP_PATH, "/builds/Shop.app")
		.with(keys::APP_PACKAGE, "com.example.shop")
		.with(keys::URL, "http://127.0.0.1:4723")
		.with(keys::IMPLICIT_TIMEOUT, "10")
		.with(keys::MAX_RETRIES, "0");

	let err = SessionSupervisor::from_source(&source, endpoint.clone()).unwrap_err();

	match err {
		SupervisorError::Config(ConfigError::PlatformMismatch { key, platform, .. }) => {
			assert_eq!(key, keys::APP_PACKAGE);
			assert_eq!(platform, Platform::Ios);
		}
		other => panic!("expected platform mismatch, got {other}"),
	}
	assert_eq!(endpoint.open_calls(), 0);
}

#[test]
fn properties_file_resolves_a_supervisor() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(ANDROID_PROPERTIES.as_bytes()).unwrap();

	let source = PropertiesSource::from_file(file.path()).unwrap();
	let supervisor = SessionSupervisor::from_source(&source, FakeEndpoint::new()).unwrap();

	let config = supervisor.config();
	assert_eq!(config.platform, Platform::Android);
	assert_eq!(config.max_retries, 2);
	assert_eq!(config.implicit_wait.as_secs(), 15);
	assert_eq!(config.android.as_ref().unwrap().app_package, "com.example.shop");
}

#[test]
fn missing_properties_file_is_a_config_error() {
	let dir = tempfile::tempdir().unwrap();
	let err = PropertiesSource::from_file(dir.path().join("absent.properties")).unwrap_err();
	assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn earlier_layers_override_later_ones() {
	let overrides = MapSource::new().with(keys::MAX_RETRIES, "5");
	let source = LayeredSource::new()
		.push(overrides)
		.push(PropertiesSource::parse(ANDROID_PROPERTIES));

	let supervisor = SessionSupervisor::from_source(&source, FakeEndpoint::new()).unwrap();
	assert_eq!(supervisor.config().max_retries, 5);
	assert_eq!(supervisor.config().device_name, "Pixel_7");
}

#[test]
fn invalid_retry_count_is_reported() {
	let source = PropertiesSource::parse(&ANDROID_PROPERTIES.replace("maxRetries = 2", "maxRetries = many"));
	let err = SessionSupervisor::from_source(&source, FakeEndpoint::new()).unwrap_err();
	assert!(err.to_string().contains("maxRetries"), "{err}");
}

#[test]
fn stored_properties_with_blank_overrides_resolve() {
	// As written by `Properties.store`: escaped colons, a wrapped value.
	let stored = "\
#Mon Oct 19 09:12:44 UTC 2026
platformName=Android
deviceName=Pixel_7
appAbsolutePath=/builds/app-debug.apk
appPackage=com.example.shop
appActivity=.MainActivity
url=http\\://127.0.0.1\\:4723\\
    /wd/hub
implicitTimeoutSeconds=15
maxRetries=2
";
	let blank_overrides = MapSource::new().with(keys::URL, "").with(keys::MAX_RETRIES, " ");
	let source = LayeredSource::new()
		.push(blank_overrides)
		.push(PropertiesSource::parse(stored));

	let supervisor = SessionSupervisor::from_source(&source, FakeEndpoint::new()).unwrap();
	assert_eq!(supervisor.config().server_url, "http://127.0.0.1:4723/wd/hub");
	assert_eq!(supervisor.config().max_retries, 2);
}
