//! URL value for the crawl core.
//!
//! Unlike a general-purpose URL type, `SiteUrl` keeps the path pre-split into
//! `dirname`/`basename` because the crawler and index processor consume that
//! split constantly (every listing entry, every index slot). Trailing
//! slashes are normalized away except for the root, whose `is_root` flag is
//! carried explicitly since it cannot be recovered from the path alone once
//! joins have happened.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("failed to parse URL: {0}")]
    Parse(String),
    #[error("cannot join an empty entry name")]
    EmptyEntryName,
    #[error("URL has no host")]
    NoHost,
}

/// An immutable URL split into the pieces the crawl core cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUrl {
    scheme: String,
    username: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    dirname: String,
    basename: String,
    is_root: bool,
}

impl SiteUrl {
    /// Parse a URL string, normalizing trailing slashes and splitting the
    /// path into `dirname`/`basename`.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let url = Url::parse(input).map_err(|e| UrlError::Parse(e.to_string()))?;
        let scheme = url.scheme().to_string();
        let username = if url.username().is_empty() {
            None
        } else {
            Some(url.username().to_string())
        };
        let password = url.password().map(ToString::to_string);
        let host = url.host_str().map(ToString::to_string);
        let port = url.port();

        let (dirname, basename, is_root) = split_path(url.path());

        Ok(Self {
            scheme,
            username,
            password,
            host,
            port,
            dirname,
            basename,
            is_root,
        })
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[must_use]
    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Full normalized path: `/` for the root, `dirname + basename` otherwise.
    #[must_use]
    pub fn path(&self) -> String {
        if self.is_root {
            "/".to_string()
        } else {
            format!("{}{}", self.dirname, self.basename)
        }
    }

    /// Path of the directory this URL denotes, always ending in `/`. Equal to
    /// `path()` for directory URLs in the crawler's usage (every URL that
    /// gets listed is itself a directory), provided as the join base.
    fn directory_path(&self) -> String {
        let p = self.path();
        if p.ends_with('/') {
            p
        } else {
            format!("{p}/")
        }
    }

    /// Construct the URL for an entry found while listing this directory.
    /// `join(dirname, basename) == path` holds for the result.
    pub fn join(&self, name: &str) -> Result<Self, UrlError> {
        let trimmed = name.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(UrlError::EmptyEntryName);
        }
        Ok(Self {
            scheme: self.scheme.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            host: self.host.clone(),
            port: self.port,
            dirname: self.directory_path(),
            basename: trimmed.to_string(),
            is_root: false,
        })
    }

    /// The URL of the directory containing this one. Idempotent at the root.
    #[must_use]
    pub fn parent(&self) -> Self {
        if self.is_root || self.dirname == "/" {
            Self {
                scheme: self.scheme.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
                host: self.host.clone(),
                port: self.port,
                dirname: "/".to_string(),
                basename: "/".to_string(),
                is_root: true,
            }
        } else {
            let trimmed = self.dirname.trim_end_matches('/');
            let (dirname, basename, is_root) = split_path(trimmed);
            Self {
                scheme: self.scheme.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
                host: self.host.clone(),
                port: self.port,
                dirname,
                basename,
                is_root,
            }
        }
    }

    /// Canonical root URL string for this site, used as the input to the
    /// site identity digest. Drops path, user info stays.
    #[must_use]
    pub fn root_url_string(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.scheme);
        s.push_str("://");
        push_authority(&mut s, self);
        s.push('/');
        s
    }
}

/// Split an already-decoded, slash-led path into `(dirname, basename,
/// is_root)`. `path` is whatever `url::Url::path()` returns (always starts
/// with `/`).
fn split_path(path: &str) -> (String, String, bool) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return ("/".to_string(), "/".to_string(), true);
    }
    match trimmed.rfind('/') {
        Some(idx) => (
            trimmed[..=idx].to_string(),
            trimmed[idx + 1..].to_string(),
            false,
        ),
        None => ("/".to_string(), trimmed.to_string(), false),
    }
}

fn push_authority(s: &mut String, url: &SiteUrl) {
    if let Some(user) = &url.username {
        s.push_str(user);
        if let Some(pass) = &url.password {
            s.push(':');
            s.push_str(pass);
        }
        s.push('@');
    }
    if let Some(host) = &url.host {
        s.push_str(host);
    }
    if let Some(port) = url.port {
        s.push(':');
        s.push_str(&port.to_string());
    }
}

impl fmt::Display for SiteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        let mut authority = String::new();
        push_authority(&mut authority, self);
        write!(f, "{authority}{}", self.path())
    }
}

impl std::str::FromStr for SiteUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_url_has_slash_dirname_and_basename() {
        let u = SiteUrl::parse("ftp://deltha.uh.cu:21/").unwrap();
        assert!(u.is_root());
        assert_eq!(u.dirname(), "/");
        assert_eq!(u.basename(), "/");
        assert_eq!(u.path(), "/");
        assert_eq!(u.port(), Some(21));
    }

    #[test]
    fn trailing_slash_normalized_for_non_root() {
        let a = SiteUrl::parse("http://h/debian/").unwrap();
        let b = SiteUrl::parse("http://h/debian").unwrap();
        assert_eq!(a.path(), b.path());
        assert!(!a.is_root());
        assert_eq!(a.dirname(), "/");
        assert_eq!(a.basename(), "debian");
    }

    #[test]
    fn join_then_path_round_trips() {
        let root = SiteUrl::parse("ftp://h/").unwrap();
        let child = root.join("pub").unwrap();
        assert_eq!(child.path(), "/pub");
        assert_eq!(child.dirname(), "/");
        assert_eq!(child.basename(), "pub");

        let grandchild = child.join("linux").unwrap();
        assert_eq!(grandchild.path(), "/pub/linux");
        assert_eq!(grandchild.dirname(), "/pub/");
        assert_eq!(grandchild.basename(), "linux");
    }

    #[test]
    fn parent_join_basename_round_trips() {
        let u = SiteUrl::parse("http://h/a/b/c").unwrap();
        let rebuilt = u.parent().join(u.basename()).unwrap();
        assert_eq!(rebuilt.path(), u.path());
    }

    #[test]
    fn join_rejects_empty_name() {
        let root = SiteUrl::parse("ftp://h/").unwrap();
        assert!(root.join("").is_err());
        assert!(root.join("/").is_err());
    }

    #[test]
    fn display_round_trips_scheme_host_port_path() {
        let raw = "ftp://deltha.uh.cu:21/debian";
        let u = SiteUrl::parse(raw).unwrap();
        assert_eq!(u.to_string(), raw);
    }

    #[test]
    fn userinfo_is_preserved() {
        let u = SiteUrl::parse("ftp://anon:pw@h/x").unwrap();
        assert_eq!(u.username(), Some("anon"));
        assert_eq!(u.password(), Some("pw"));
        assert_eq!(u.to_string(), "ftp://anon:pw@h/x");
    }
}
