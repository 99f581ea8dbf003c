// SPDX-License-Identifier: MIT

//! Resource handle (§4.1): an opaque reference to an addressable byte
//! container. Only the `file` scheme is operated on; other schemes are
//! preserved opaquely through URI round-trips (§6).

use crate::error::EngineError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCHEME: &str = "file";

/// Parsed authority component of a URI (`user:pass@host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub username: Option<String>,
    pub password: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
}

impl Location {
    fn parse(authority: &str) -> Self {
        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((u, h)) => (Some(u), h),
            None => (None, authority),
        };
        let (username, password) = match userinfo {
            Some(u) => match u.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(u.to_string()), None),
            },
            None => (None, None),
        };
        let (hostname, port) = match hostport.rsplit_once(':') {
            Some((h, p)) => (
                Some(h.to_string()).filter(|s| !s.is_empty()),
                p.parse::<u16>().ok(),
            ),
            None => (
                Some(hostport.to_string()).filter(|s| !s.is_empty()),
                None,
            ),
        };
        Self {
            username,
            password,
            hostname,
            port,
        }
    }

    fn to_authority_string(&self) -> String {
        let mut s = String::new();
        if let Some(user) = &self.username {
            s.push_str(user);
            if let Some(pass) = &self.password {
                s.push(':');
                s.push_str(pass);
            }
            s.push('@');
        }
        if let Some(host) = &self.hostname {
            s.push_str(host);
        }
        if let Some(port) = self.port {
            s.push(':');
            s.push_str(&port.to_string());
        }
        s
    }
}

/// A parsed resource URI: scheme + optional authority + path + query +
/// fragment, mirroring `urllib.parse.SplitResult` from the reference
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: String,
    pub location: Option<Location>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl Uri {
    pub fn parse(input: &str, default_scheme: &str) -> Self {
        let (scheme, rest) = match input.split_once("://") {
            Some((scheme, rest)) => (scheme.to_string(), rest.to_string()),
            None => (default_scheme.to_string(), input.to_string()),
        };

        let (rest, fragment) = match rest.split_once('#') {
            Some((r, f)) => (r.to_string(), Some(f.to_string())),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r.to_string(), Some(q.to_string())),
            None => (rest, None),
        };

        let (location, path) = if let Some(stripped) = rest.strip_prefix("//") {
            match stripped.find('/') {
                Some(idx) => (
                    Some(Location::parse(&stripped[..idx])),
                    stripped[idx..].to_string(),
                ),
                None => (Some(Location::parse(stripped)), String::new()),
            }
        } else {
            (None, rest)
        };

        Uri {
            scheme,
            location,
            path,
            query,
            fragment,
        }
    }

    pub fn to_text(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.scheme);
        s.push(':');
        if let Some(loc) = &self.location {
            s.push_str("//");
            s.push_str(&loc.to_authority_string());
        }
        s.push_str(&self.path);
        if let Some(q) = &self.query {
            s.push('?');
            s.push_str(q);
        }
        if let Some(f) = &self.fragment {
            s.push('#');
            s.push_str(f);
        }
        s
    }

    fn with_path(&self, path: String) -> Self {
        Uri {
            scheme: self.scheme.clone(),
            location: self.location.clone(),
            path,
            query: None,
            fragment: None,
        }
    }
}

/// Read or write intent for `Resource::open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// A byte stream backing an open resource. Writers get a file truncated
/// (and created, with intermediate directories) at open time; readers get
/// a file that must already exist.
pub trait Stream: io::Read + io::Write + Send + fmt::Debug {}
impl<T: io::Read + io::Write + Send + fmt::Debug> Stream for T {}

/// Uniform handle contract (§4.1). Implementations are value-like: the
/// backing file descriptor is only materialized on `open`.
pub trait Resource: Send + Sync + fmt::Debug {
    fn uri(&self) -> &Uri;

    fn exists(&self) -> Result<bool, EngineError>;

    fn name(&self) -> String;

    /// Recursive delete. Returns `true` if something was removed.
    fn delete(&self) -> Result<bool, EngineError>;

    fn open(&self, mode: OpenMode) -> Result<Box<dyn Stream>, EngineError>;

    /// Child resource. `relpath` must be relative; an absolute path or a
    /// differing explicit scheme is rejected.
    fn ref_child(&self, relpath: &str) -> Result<Box<dyn Resource>, EngineError>;

    fn parent(&self) -> Box<dyn Resource>;

    /// URI as text.
    fn unref(&self) -> String {
        self.uri().to_text()
    }
}

fn reject_child_path(parent_scheme: &str, relpath: &str) -> Result<(), EngineError> {
    if relpath.starts_with('/') {
        return Err(EngineError::IoError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("child path must be relative: {relpath}"),
        )));
    }
    if let Some((scheme, _)) = relpath.split_once("://") {
        if scheme != parent_scheme {
            return Err(EngineError::IoError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("scheme mismatch: expected '{parent_scheme}', got '{scheme}'"),
            )));
        }
    }
    Ok(())
}

/// The default (`file`) scheme backend. Relative paths are resolved
/// against the process CWD at construction (§4.1).
#[derive(Debug)]
pub struct FileResource {
    uri: Uri,
    path: PathBuf,
}

impl FileResource {
    pub fn new(uri: Uri) -> Result<Self, EngineError> {
        let raw = Path::new(&uri.path);
        let path = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            std::env::current_dir()?.join(raw)
        };
        let uri = uri.with_path(path.to_string_lossy().into_owned());
        Ok(Self { uri, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for FileResource {
    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn exists(&self) -> Result<bool, EngineError> {
        Ok(self.path.exists())
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn delete(&self) -> Result<bool, EngineError> {
        if !self.path.exists() {
            return Ok(false);
        }
        if self.path.is_dir() {
            fs::remove_dir_all(&self.path)?;
        } else {
            fs::remove_file(&self.path)?;
        }
        Ok(true)
    }

    fn open(&self, mode: OpenMode) -> Result<Box<dyn Stream>, EngineError> {
        match mode {
            OpenMode::Read => {
                if !self.path.exists() {
                    return Err(EngineError::NotFound(self.path.display().to_string()));
                }
                Ok(Box::new(fs::OpenOptions::new().read(true).open(&self.path)?))
            }
            OpenMode::Write => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(Box::new(
                    fs::OpenOptions::new()
                        .write(true)
                        .create(true)
                        .truncate(true)
                        .open(&self.path)?,
                ))
            }
        }
    }

    fn ref_child(&self, relpath: &str) -> Result<Box<dyn Resource>, EngineError> {
        reject_child_path(&self.uri.scheme, relpath)?;
        let joined = self.path.join(relpath);
        let new_uri = self.uri.with_path(joined.to_string_lossy().into_owned());
        Ok(Box::new(FileResource {
            uri: new_uri,
            path: joined,
        }))
    }

    fn parent(&self) -> Box<dyn Resource> {
        let parent_path = self.path.parent().unwrap_or(&self.path).to_path_buf();
        let new_uri = self
            .uri
            .with_path(parent_path.to_string_lossy().into_owned());
        Box::new(FileResource {
            uri: new_uri,
            path: parent_path,
        })
    }
}

/// A resource under a non-`file` scheme. Round-trips its URI but rejects
/// every operation that would require touching the backing store (§6).
#[derive(Debug)]
pub struct OpaqueResource {
    uri: Uri,
}

impl Resource for OpaqueResource {
    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn exists(&self) -> Result<bool, EngineError> {
        Err(unsupported(&self.uri.scheme))
    }

    fn name(&self) -> String {
        self.uri
            .path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    fn delete(&self) -> Result<bool, EngineError> {
        Err(unsupported(&self.uri.scheme))
    }

    fn open(&self, _mode: OpenMode) -> Result<Box<dyn Stream>, EngineError> {
        Err(unsupported(&self.uri.scheme))
    }

    fn ref_child(&self, relpath: &str) -> Result<Box<dyn Resource>, EngineError> {
        reject_child_path(&self.uri.scheme, relpath)?;
        let joined = join_opaque_path(&self.uri.path, relpath);
        Ok(Box::new(OpaqueResource {
            uri: self.uri.with_path(joined),
        }))
    }

    fn parent(&self) -> Box<dyn Resource> {
        let trimmed = self.uri.path.trim_end_matches('/');
        let parent_path = match trimmed.rfind('/') {
            Some(idx) => trimmed[..=idx].to_string(),
            None => String::new(),
        };
        Box::new(OpaqueResource {
            uri: self.uri.with_path(parent_path),
        })
    }
}

fn join_opaque_path(base: &str, relpath: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{relpath}")
    } else {
        format!("{base}/{relpath}")
    }
}

fn unsupported(scheme: &str) -> EngineError {
    EngineError::IoError(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("scheme '{scheme}' is not operated on by this engine"),
    ))
}

/// Resolve a URI string into a `Resource` handle, picking the `file`
/// backend for the default scheme and an opaque pass-through otherwise.
pub fn from_uri(uri_str: &str) -> Result<Box<dyn Resource>, EngineError> {
    let uri = Uri::parse(uri_str, DEFAULT_SCHEME);
    if uri.scheme == DEFAULT_SCHEME {
        Ok(Box::new(FileResource::new(uri)?))
    } else {
        Ok(Box::new(OpaqueResource { uri }))
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
