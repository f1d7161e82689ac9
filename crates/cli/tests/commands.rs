//! End-to-end tests for the `devsess` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

// Unique so developer environment variables never leak into the tests.
const ENV_PREFIX: &str = "DEVSESS_CLI_TEST_";

const ANDROID_PROPERTIES: &str = "\
platformName=Android
deviceName=emulator-5554
appAbsolutePath=/apps/cat.apk
appPackage=com.cat.app
appActivity=.MainActivity
url=http://127.0.0.1:4723/wd/hub
implicitTimeoutSeconds=10
maxRetries=1
";

fn devsess(config: &Path, args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_devsess"))
		.arg("--config")
		.arg(config)
		.args(["--env-prefix", ENV_PREFIX])
		.args(args)
		.env_remove("RUST_LOG")
		.output()
		.expect("failed to execute devsess")
}

fn properties(text: &str) -> tempfile::NamedTempFile {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(text.as_bytes()).unwrap();
	file
}

fn stdout_json(output: &Output) -> Value {
	let stdout = String::from_utf8_lossy(&output.stdout);
	serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}"))
}

#[test]
fn config_prints_resolved_values_as_json() {
	let file = properties(ANDROID_PROPERTIES);
	let output = devsess(file.path(), &["-f", "json", "config"]);

	assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
	let json = stdout_json(&output);
	assert_eq!(json["ok"], true);
	assert_eq!(json["command"], "config");
	assert_eq!(json["data"]["platform"], "Android");
	assert_eq!(json["data"]["android"]["appPackage"], "com.cat.app");
	assert_eq!(json["data"]["implicitWait"], 10);
	assert_eq!(json["data"]["handshakeTimeout"], 120);
}

#[test]
fn set_overrides_the_properties_file() {
	let file = properties(ANDROID_PROPERTIES);
	let output = devsess(file.path(), &["-f", "json", "--set", "maxRetries=4", "config"]);

	assert!(output.status.success());
	assert_eq!(stdout_json(&output)["data"]["maxRetries"], 4);
}

#[test]
fn android_without_app_activity_exits_non_zero() {
	let file = properties(&ANDROID_PROPERTIES.replace("appActivity=.MainActivity\n", ""));
	let output = devsess(file.path(), &["-f", "json", "config"]);

	assert!(!output.status.success());
	let json = stdout_json(&output);
	assert_eq!(json["ok"], false);
	assert_eq!(json["error"]["code"], "CONFIG_ERROR");
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("appActivity"), "stderr: {stderr}");
}

#[test]
fn probe_against_unreachable_server_reports_failure() {
	let file = properties(ANDROID_PROPERTIES);
	let output = devsess(
		file.path(),
		&["-f", "json", "--set", "url=http://127.0.0.1:9", "probe", "--retries", "0"],
	);

	assert!(!output.status.success());
	let json = stdout_json(&output);
	assert_eq!(json["ok"], false);
	assert_eq!(json["error"]["code"], "PROBE_FAILED");
	let method = &json["data"]["report"]["methods"][0];
	assert_eq!(method["method"], "probe");
	assert_eq!(method["outcome"], "failed");
	assert_eq!(method["attempts"].as_array().unwrap().len(), 1);
	assert_eq!(method["attempts"][0]["outcome"]["kind"], "connection_failed");
}
