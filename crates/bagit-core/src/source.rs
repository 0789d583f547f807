//! Byte sources addressed by URL.
//!
//! Profiles, fetch-referenced payload and collection content are all read
//! through a [`RemoteSource`]. The bundled [`SourceOpener`] serves `file://`
//! from the local filesystem and `http(s)://` through a blocking HTTP client.

use std::fs::File;
use std::io::{self, Read};
use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;
use url::Url;

/// Opens readable streams for URLs.
///
/// Implementations must be shareable across threads; one opener typically
/// serves many concurrent bag constructions.
pub trait RemoteSource: Send + Sync + std::fmt::Debug {
    /// Open `url` for a single sequential read.
    fn open(&self, url: &Url) -> io::Result<Box<dyn Read + Send>>;

    /// Check that `url` is reachable and readable without consuming it.
    fn probe(&self, url: &Url) -> io::Result<()> {
        self.open(url).map(|_| ())
    }
}

/// Local filesystem source for `file://` URLs.
#[derive(Debug, Clone, Default)]
pub struct FileSource;

impl FileSource {
    fn path_of(url: &Url) -> io::Result<std::path::PathBuf> {
        url.to_file_path().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a local file URL: {}", url),
            )
        })
    }
}

impl RemoteSource for FileSource {
    fn open(&self, url: &Url) -> io::Result<Box<dyn Read + Send>> {
        let path = Self::path_of(url)?;
        Ok(Box::new(File::open(path)?))
    }

    fn probe(&self, url: &Url) -> io::Result<()> {
        let path = Self::path_of(url)?;
        let meta = std::fs::metadata(&path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        File::open(&path).map(|_| ())
    }
}

/// Blocking HTTP(S) source.
///
/// The client is built on first use so that constructing an opener never
/// fails and never touches the network.
#[derive(Debug)]
pub struct HttpSource {
    timeout: Duration,
    client: OnceLock<Result<reqwest::blocking::Client, String>>,
}

/// User agent sent with every remote request.
pub const USER_AGENT: &str = concat!("bagit-core/", env!("CARGO_PKG_VERSION"));

impl HttpSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> io::Result<&reqwest::blocking::Client> {
        self.client
            .get_or_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|e| io::Error::other(format!("failed to build HTTP client: {}", e)))
    }
}

fn http_error(url: &Url, err: reqwest::Error) -> io::Error {
    let kind = match err.status() {
        Some(status) if status == reqwest::StatusCode::NOT_FOUND => io::ErrorKind::NotFound,
        Some(status) if status == reqwest::StatusCode::FORBIDDEN => {
            io::ErrorKind::PermissionDenied
        }
        _ if err.is_timeout() => io::ErrorKind::TimedOut,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, format!("request to {} failed: {}", url, err))
}

impl RemoteSource for HttpSource {
    fn open(&self, url: &Url) -> io::Result<Box<dyn Read + Send>> {
        debug!(url = %url, "opening remote source");
        let response = self
            .client()?
            .get(url.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error(url, e))?;
        Ok(Box::new(response))
    }

    fn probe(&self, url: &Url) -> io::Result<()> {
        self.client()?
            .head(url.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| http_error(url, e))
    }
}

/// Scheme-dispatching source: `file` locally, `http`/`https` remotely.
#[derive(Debug)]
pub struct SourceOpener {
    file: FileSource,
    http: HttpSource,
}

impl SourceOpener {
    pub fn new(timeout: Duration) -> Self {
        Self {
            file: FileSource,
            http: HttpSource::new(timeout),
        }
    }

    fn select(&self, url: &Url) -> io::Result<&dyn RemoteSource> {
        match url.scheme() {
            "file" => Ok(&self.file),
            "http" | "https" => Ok(&self.http),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported URL scheme {:?} in {}", other, url),
            )),
        }
    }
}

impl Default for SourceOpener {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl RemoteSource for SourceOpener {
    fn open(&self, url: &Url) -> io::Result<Box<dyn Read + Send>> {
        self.select(url)?.open(url)
    }

    fn probe(&self, url: &Url) -> io::Result<()> {
        self.select(url)?.probe(url)
    }
}

/// Parse a location that may be a URL or a bare filesystem path.
pub fn parse_location(location: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(location) {
        // Single-letter schemes are Windows drive letters, not URLs.
        if url.scheme().len() > 1 {
            return Some(url);
        }
    }
    let path = std::path::Path::new(location);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Url::from_file_path(absolute).ok()
}
