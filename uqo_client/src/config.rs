use crate::profile::get_config_paths;
use crate::session::{Connection, Session};
use crate::transport::{default_server_key_file, CurveTransport, DEFAULT_TIMEOUT};
use crate::{ApiError, Result};
use ini::Ini;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where and how to reach a UQO server.
#[derive(Clone, Deserialize)]
pub struct Config {
	/// `host:port`
	pub endpoint: String,
	/// Authentication method, e.g. `"token"`.
	#[serde(alias = "auth_method")]
	pub method: String,
	pub credentials: String,
	/// Client certificate holding the CURVE key pair.
	pub private_key_file: PathBuf,
	/// Server certificate; defaults to `uqo_public.key` next to the client key.
	#[serde(default)]
	pub server_public_key_file: Option<PathBuf>,
	/// Reply timeout in seconds, fractions allowed; `0` waits forever.
	#[serde(default)]
	pub timeout: Option<f64>,
}

impl Config {
	pub fn new<P: Into<PathBuf>>(
		endpoint: &str,
		method: &str,
		credentials: &str,
		private_key_file: P,
	) -> Self {
		Self {
			endpoint: endpoint.to_owned(),
			method: method.to_owned(),
			credentials: credentials.to_owned(),
			private_key_file: private_key_file.into(),
			server_public_key_file: None,
			timeout: None,
		}
	}

	pub fn with_server_public_key_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
		self.server_public_key_file = Some(path.into());
		self
	}

	/// `None` and a zero duration both wait forever.
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = Some(timeout.map_or(0.0, |t| t.as_secs_f64()));
		self
	}

	/// Load a JSON object with the keys `endpoint`, `method`, `credentials`,
	/// `private_key_file` and optionally `server_public_key_file` and `timeout`.
	pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let file = File::open(path.as_ref())?;
		let mut config: Config = serde_json::from_reader(BufReader::new(file))?;
		if let Some(secs) = config.timeout {
			check_timeout(secs, path.as_ref())?;
		}
		config.expand_paths();
		Ok(config)
	}

	/// Load settings from ini files.
	///
	/// Args:
	/// * `fname` - Load settings from given file, or from the default search
	///   path if None. Files ending in `.json` go to [`Config::from_json_file`].
	/// * `profile` - Use given section of each ini file. If None, use the
	///   `profile` key of the file, else its first section.
	pub fn from_file(fname: Option<PathBuf>, profile: Option<&str>) -> Result<Self> {
		if let Some(fname) = fname.as_ref() {
			if fname.extension().map_or(false, |ext| ext == "json") {
				return Self::from_json_file(fname);
			}
		}
		let files = if let Some(fname) = fname {
			vec![fname]
		} else {
			get_config_paths()
		};
		let files = files
			.into_iter()
			.filter(|p| p.exists())
			.collect::<Vec<_>>();
		if files.is_empty() {
			return Err(ApiError::LoadConfig("Cannot find config file".to_owned()));
		}
		let mut partial = PartialConfig::default();
		for fname in files.iter() {
			let ini = Ini::load_from_file(fname)?;
			let section = select_section(&ini, profile);
			partial.update(&ini, section, fname)?;
		}
		let mut config = partial.build()?;
		config.expand_paths();
		Ok(config)
	}

	/// `None` waits for replies forever.
	pub fn timeout(&self) -> Option<Duration> {
		match self.timeout {
			None => Some(DEFAULT_TIMEOUT),
			Some(secs) if secs.is_finite() && secs > 0.0 => {
				Some(Duration::from_secs_f64(secs))
			}
			Some(_) => None,
		}
	}

	pub fn server_key_path(&self) -> PathBuf {
		self.server_public_key_file
			.clone()
			.unwrap_or_else(|| default_server_key_file(&self.private_key_file))
	}

	pub fn create_transport(&self) -> CurveTransport {
		CurveTransport::new(
			self.endpoint.clone(),
			self.private_key_file.clone(),
			self.server_key_path(),
		)
		.with_timeout(self.timeout())
	}

	pub fn create_session(&self) -> Session {
		Session::with_transport(
			&self.endpoint,
			&self.method,
			&self.credentials,
			Arc::new(self.create_transport()),
		)
	}

	pub fn create_connection(&self) -> Connection {
		Connection::from_session(self.create_session())
	}

	fn expand_paths(&mut self) {
		self.private_key_file = expand(&self.private_key_file);
		if let Some(path) = self.server_public_key_file.take() {
			self.server_public_key_file = Some(expand(&path));
		}
	}
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("endpoint", &self.endpoint)
			.field("method", &self.method)
			.field("credentials", &"<redacted>")
			.field("private_key_file", &self.private_key_file)
			.field("server_public_key_file", &self.server_public_key_file)
			.field("timeout", &self.timeout)
			.finish()
	}
}

fn expand(path: &Path) -> PathBuf {
	PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn check_timeout(secs: f64, fname: &Path) -> Result<f64> {
	if secs.is_finite() && secs >= 0.0 {
		Ok(secs)
	} else {
		Err(ApiError::LoadConfig(format!(
			"timeout must be a non-negative number of seconds, got {} in {}",
			secs,
			fname.display()
		)))
	}
}

fn select_section<'a>(ini: &'a Ini, profile: Option<&'a str>) -> Option<&'a str> {
	profile
		.or_else(|| ini.get_from(None::<String>, "profile"))
		.or_else(|| ini.sections().flatten().next())
}

#[derive(Default)]
struct PartialConfig {
	endpoint: Option<String>,
	method: Option<String>,
	credentials: Option<String>,
	private_key_file: Option<PathBuf>,
	server_public_key_file: Option<PathBuf>,
	timeout: Option<f64>,
}

impl PartialConfig {
	fn update(&mut self, ini: &Ini, section: Option<&str>, fname: &Path) -> Result<()> {
		let get = |key: &str| {
			ini.get_from(section, key)
				.or_else(|| ini.get_from(None::<String>, key))
		};
		if let Some(endpoint) = get("endpoint") {
			self.endpoint = Some(endpoint.to_owned());
		}
		if let Some(method) = get("method").or_else(|| get("auth_method")) {
			self.method = Some(method.to_owned());
		}
		if let Some(credentials) = get("credentials") {
			self.credentials = Some(credentials.to_owned());
		}
		if let Some(path) = get("private_key_file") {
			self.private_key_file = Some(PathBuf::from(path));
		}
		if let Some(path) = get("server_public_key_file") {
			self.server_public_key_file = Some(PathBuf::from(path));
		}
		if let Some(timeout) = get("timeout") {
			let secs = timeout.trim().parse().map_err(|_| {
				ApiError::LoadConfig(format!(
					"Cannot understand timeout '{}' in {}",
					timeout,
					fname.display()
				))
			})?;
			self.timeout = Some(check_timeout(secs, fname)?);
		}
		Ok(())
	}

	fn build(self) -> Result<Config> {
		fn required<T>(value: Option<T>, key: &str) -> Result<T> {
			value.ok_or_else(|| ApiError::LoadConfig(format!("missing key '{}'", key)))
		}
		Ok(Config {
			endpoint: required(self.endpoint, "endpoint")?,
			method: required(self.method, "method")?,
			credentials: required(self.credentials, "credentials")?,
			private_key_file: required(self.private_key_file, "private_key_file")?,
			server_public_key_file: self.server_public_key_file,
			timeout: self.timeout,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
		let path = dir.join(name);
		File::create(&path)
			.unwrap()
			.write_all(body.as_bytes())
			.unwrap();
		path
	}

	#[test]
	fn loads_json_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_file(
			dir.path(),
			"config.json",
			r#"{"endpoint": "uqo.example.org:5555", "method": "token",
				"credentials": "abc", "private_key_file": "/keys/client.key_secret"}"#,
		);
		let config = Config::from_json_file(&path).unwrap();
		assert_eq!(config.endpoint, "uqo.example.org:5555");
		assert_eq!(config.method, "token");
		assert_eq!(config.timeout(), Some(DEFAULT_TIMEOUT));
		assert_eq!(config.server_key_path(), PathBuf::from("/keys/uqo_public.key"));
		assert!(!format!("{:?}", config).contains("abc"));

		let routed = Config::from_file(Some(path), None).unwrap();
		assert_eq!(routed.credentials, "abc");
	}

	#[test]
	fn ini_profile_selection() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_file(
			dir.path(),
			"uqo.conf",
			"profile = staging\n\
			 \n\
			 [production]\n\
			 endpoint = uqo.example.org:5555\n\
			 method = token\n\
			 credentials = prod\n\
			 private_key_file = /keys/prod.key_secret\n\
			 \n\
			 [staging]\n\
			 endpoint = localhost:5555\n\
			 method = token\n\
			 credentials = dev\n\
			 private_key_file = /keys/dev.key_secret\n\
			 timeout = 0\n",
		);
		let config = Config::from_file(Some(path.clone()), None).unwrap();
		assert_eq!(config.credentials, "dev");
		assert_eq!(config.timeout(), None);

		let config = Config::from_file(Some(path), Some("production")).unwrap();
		assert_eq!(config.endpoint, "uqo.example.org:5555");
		assert_eq!(config.private_key_file, PathBuf::from("/keys/prod.key_secret"));
	}

	#[test]
	fn missing_key_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_file(
			dir.path(),
			"uqo.conf",
			"[default]\nendpoint = localhost:5555\nmethod = token\n",
		);
		match Config::from_file(Some(path), None) {
			Err(ApiError::LoadConfig(message)) => assert!(message.contains("credentials")),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn missing_file_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(
			Config::from_file(Some(dir.path().join("absent.conf")), None),
			Err(ApiError::LoadConfig(_))
		));
	}

	#[test]
	fn sub_second_timeouts_are_kept() {
		let config = Config::new("localhost:5555", "token", "t", "client.key_secret")
			.with_timeout(Some(Duration::from_millis(250)));
		assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
		let config = config.with_timeout(Some(Duration::from_secs(0)));
		assert_eq!(config.timeout(), None);
		let config = config.with_timeout(None);
		assert_eq!(config.timeout(), None);

		let dir = tempfile::tempdir().unwrap();
		let path = write_file(
			dir.path(),
			"uqo.conf",
			"[default]\n\
			 endpoint = localhost:5555\n\
			 method = token\n\
			 credentials = dev\n\
			 private_key_file = /keys/dev.key_secret\n\
			 timeout = 0.5\n",
		);
		let config = Config::from_file(Some(path), None).unwrap();
		assert_eq!(config.timeout(), Some(Duration::from_millis(500)));

		let path = write_file(
			dir.path(),
			"negative.conf",
			"[default]\nendpoint = x:1\nmethod = token\ncredentials = c\n\
			 private_key_file = k\ntimeout = -1\n",
		);
		assert!(matches!(
			Config::from_file(Some(path), None),
			Err(ApiError::LoadConfig(_))
		));
	}

	#[test]
	fn explicit_server_key_and_timeout() {
		let config = Config::new("localhost:5555", "token", "t", "client.key_secret")
			.with_server_public_key_file("/srv/uqo.key")
			.with_timeout(Some(Duration::from_secs(5)));
		assert_eq!(config.server_key_path(), PathBuf::from("/srv/uqo.key"));
		assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
		assert_eq!(config.create_transport().timeout(), Some(Duration::from_secs(5)));
	}
}
