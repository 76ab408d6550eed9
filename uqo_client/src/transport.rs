//! Request/reply transports between a [`Session`](crate::Session) and a UQO server.
use crate::{ApiError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::convert::TryFrom;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

/// How long a request waits for its reply unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// File name of the server's public key, looked up next to the client key.
pub const SERVER_KEY_FILE_NAME: &str = "uqo_public.key";

/// Carries one JSON request to the server and returns its one JSON reply.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn request(&self, message: Value) -> Result<Value>;
}

pub fn default_server_key_file(private_key_file: &Path) -> PathBuf {
	private_key_file
		.parent()
		.unwrap_or_else(|| Path::new(""))
		.join(SERVER_KEY_FILE_NAME)
}

/// ZeroMQ REQ socket secured with CURVE.
///
/// The context lives as long as the transport; each request opens its own
/// socket and runs the blocking exchange on tokio's blocking pool.
pub struct CurveTransport {
	context: zmq::Context,
	endpoint: String,
	private_key_file: PathBuf,
	server_key_file: PathBuf,
	timeout: Option<Duration>,
	keys: OnceCell<Arc<CurveKeys>>,
}

impl CurveTransport {
	pub fn new<S, P, Q>(endpoint: S, private_key_file: P, server_key_file: Q) -> Self
	where
		S: Into<String>,
		P: Into<PathBuf>,
		Q: Into<PathBuf>,
	{
		Self {
			context: zmq::Context::new(),
			endpoint: endpoint.into(),
			private_key_file: private_key_file.into(),
			server_key_file: server_key_file.into(),
			timeout: Some(DEFAULT_TIMEOUT),
			keys: OnceCell::new(),
		}
	}

	/// `None` and a zero duration wait for a reply forever.
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	async fn keys(&self) -> Result<Arc<CurveKeys>> {
		let keys = self
			.keys
			.get_or_try_init(|| async {
				debug!(private_key_file = %self.private_key_file.display(), "loading CURVE keys");
				CurveKeys::load(&self.private_key_file, &self.server_key_file).map(Arc::new)
			})
			.await?;
		Ok(Arc::clone(keys))
	}
}

impl fmt::Debug for CurveTransport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CurveTransport")
			.field("endpoint", &self.endpoint)
			.field("private_key_file", &self.private_key_file)
			.field("server_key_file", &self.server_key_file)
			.field("timeout", &self.timeout)
			.finish()
	}
}

#[async_trait]
impl Transport for CurveTransport {
	#[instrument(skip(self, message), fields(endpoint = %self.endpoint))]
	async fn request(&self, message: Value) -> Result<Value> {
		let keys = self.keys().await?;
		let payload = serde_json::to_vec(&message)?;
		let context = self.context.clone();
		let address = format!("tcp://{}", self.endpoint);
		let timeout = self.timeout;
		let reply = tokio::task::spawn_blocking(move || {
			exchange(&context, &address, &keys, timeout, payload)
		})
		.await
		.map_err(|e| ApiError::Runtime(e.to_string()))?;
		let reply = match reply {
			Ok(reply) => reply,
			Err(zmq::Error::EAGAIN) => {
				return Err(ApiError::Timeout {
					endpoint: self.endpoint.clone(),
					timeout: timeout.unwrap_or_default(),
				})
			}
			Err(e) => return Err(e.into()),
		};
		debug!(bytes = reply.len(), "received reply");
		Ok(serde_json::from_slice(&reply)?)
	}
}

fn exchange(
	context: &zmq::Context,
	address: &str,
	keys: &CurveKeys,
	timeout: Option<Duration>,
	payload: Vec<u8>,
) -> std::result::Result<Vec<u8>, zmq::Error> {
	let socket = context.socket(zmq::REQ)?;
	socket.set_curve_serverkey(&keys.server_public)?;
	socket.set_curve_publickey(&keys.client_public)?;
	socket.set_curve_secretkey(&keys.client_secret)?;
	socket.set_linger(0)?;
	if let Some(timeout) = timeout.filter(|t| !t.is_zero()) {
		let millis = i32::try_from(timeout.as_millis())
			.unwrap_or(i32::MAX)
			.max(1);
		socket.set_rcvtimeo(millis)?;
		socket.set_sndtimeo(millis)?;
	}
	socket.connect(address)?;
	socket.send(payload, 0)?;
	socket.recv_bytes(0)
}

/// Client key pair and server public key, 32 bytes each.
#[derive(Clone)]
pub struct CurveKeys {
	client_public: Vec<u8>,
	client_secret: Vec<u8>,
	server_public: Vec<u8>,
}

impl CurveKeys {
	pub fn load(private_key_file: &Path, server_key_file: &Path) -> Result<Self> {
		let (client_public, client_secret) = load_certificate(private_key_file)?;
		let client_secret =
			client_secret.ok_or_else(|| key_error(private_key_file, "no secret-key entry"))?;
		let (server_public, _) = load_certificate(server_key_file)?;
		Ok(Self {
			client_public,
			client_secret,
			server_public,
		})
	}
}

impl fmt::Debug for CurveKeys {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CurveKeys")
			.field("client_public", &zmq::z85_encode(&self.client_public).ok())
			.field("client_secret", &"<redacted>")
			.field("server_public", &zmq::z85_encode(&self.server_public).ok())
			.finish()
	}
}

/// Read a ZeroMQ certificate: `public-key` and optional `secret-key`, Z85 encoded.
pub fn load_certificate(path: &Path) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
	let text = std::fs::read_to_string(path).map_err(|e| key_error(path, &e.to_string()))?;
	let mut public = None;
	let mut secret = None;
	for line in text.lines().map(str::trim) {
		if line.starts_with('#') {
			continue;
		}
		if let Some((key, value)) = line.split_once('=') {
			let value = value.trim().trim_matches('"');
			match key.trim() {
				"public-key" => public = Some(decode_key(path, value)?),
				"secret-key" => secret = Some(decode_key(path, value)?),
				_ => (),
			}
		}
	}
	let public = public.ok_or_else(|| key_error(path, "no public-key entry"))?;
	Ok((public, secret))
}

fn decode_key(path: &Path, z85: &str) -> Result<Vec<u8>> {
	let key = zmq::z85_decode(z85).map_err(|e| key_error(path, &format!("bad Z85 key: {:?}", e)))?;
	if key.len() != 32 {
		return Err(key_error(path, "CURVE keys are 32 bytes"));
	}
	Ok(key)
}

fn key_error(path: &Path, reason: &str) -> ApiError {
	ApiError::Key {
		path: path.to_owned(),
		reason: reason.to_owned(),
	}
}

/// Transport that answers from a queue of canned replies and records every
/// request it is given. Useful for exercising sessions without a server.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	replies: Mutex<VecDeque<Value>>,
	requests: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
	pub fn new<I: IntoIterator<Item = Value>>(replies: I) -> Self {
		Self {
			replies: Mutex::new(replies.into_iter().collect()),
			requests: Mutex::new(Vec::new()),
		}
	}

	pub fn push_reply(&self, reply: Value) {
		self.replies
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push_back(reply);
	}

	/// Requests received so far, oldest first.
	pub fn requests(&self) -> Vec<Value> {
		self.requests
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}
}

#[async_trait]
impl Transport for ScriptedTransport {
	async fn request(&self, message: Value) -> Result<Value> {
		self.requests
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(message);
		self.replies
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.pop_front()
			.ok_or_else(|| ApiError::Closed("no scripted reply left".to_owned()))
	}
}
