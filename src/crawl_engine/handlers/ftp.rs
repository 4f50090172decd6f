//! FTP handler: connect, `CWD` into the directory, `LIST` it, and parse
//! whatever listing format the server speaks (UNIX `ls -l`, MS-DOS, or
//! EPLF), mirroring the original's `ftplib`-based handler.
//!
//! Error routing follows the original's exception handling: connection and
//! login failures are site-level (the whole site backs off); a `CWD`
//! rejected with "no such directory" means the listing is gone (a
//! not-found result, not an error); any other `CWD`/`LIST` failure is
//! directory-level.

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use suppaftp::{AsyncFtpStream, FtpError};

use crate::queue::{CrawlEntry, CrawlResult, CrawlTask, ResultQueue, TaskQueue};

use super::ProtocolHandler;
use crate::crawl_engine::types::HandlerOutcome;

pub struct FtpHandler {
    timeout: Duration,
}

impl FtpHandler {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn connect(&self, task: &CrawlTask) -> Result<AsyncFtpStream, FtpError> {
        let host = task.url.host().unwrap_or("");
        let port = task.url.port().unwrap_or(21);
        let addr = format!("{host}:{port}");
        let mut stream = tokio::time::timeout(self.timeout, AsyncFtpStream::connect(&addr))
            .await
            .map_err(|_| FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "ftp connect timed out",
            )))??;

        let user = task.url.username().unwrap_or("anonymous");
        let pass = task.url.password().unwrap_or("anonymous@crate.invalid");
        stream.login(user, pass).await?;
        Ok(stream)
    }
}

#[async_trait]
impl ProtocolHandler for FtpHandler {
    fn scheme(&self) -> &str {
        "ftp"
    }

    async fn execute(
        &self,
        task: &CrawlTask,
        tasks: &TaskQueue,
        results: &ResultQueue,
    ) -> HandlerOutcome {
        let mut stream = match self.connect(task).await {
            Ok(s) => s,
            Err(e) => {
                warn!("ftp: connect/login failed for {}: {e}", task.url);
                let _ = tasks.report_error_site(task).await;
                return HandlerOutcome::ErrorSite;
            }
        };

        let path = task.url.path();
        if let Err(e) = stream.cwd(&path).await {
            let _ = stream.quit().await;
            if is_not_found(&e) {
                let result = CrawlResult::not_found(task.clone());
                if results.put(&result).await.is_err() || tasks.report_done(task).await.is_err() {
                    return HandlerOutcome::ErrorSite;
                }
                return HandlerOutcome::Done(result);
            }
            warn!("ftp: CWD {path} failed: {e}");
            let _ = tasks.report_error_dir(task).await;
            return HandlerOutcome::ErrorDir;
        }

        let lines = match stream.list(None).await {
            Ok(lines) => lines,
            Err(e) => {
                let _ = stream.quit().await;
                warn!("ftp: LIST {path} failed: {e}");
                let _ = tasks.report_error_dir(task).await;
                return HandlerOutcome::ErrorDir;
            }
        };

        let mut result = CrawlResult::found(task.clone());
        for line in &lines {
            let Some((name, is_dir_hint)) = parse_list_line(line) else {
                continue;
            };
            let Ok(url) = task.url.join(&name) else {
                continue;
            };
            let is_dir = match is_dir_hint {
                Some(v) => v,
                None => probe_is_dir(&mut stream, &path, &name).await,
            };
            result.push(name, CrawlEntry {
                is_dir,
                url,
                content_text: None,
            });
        }

        let _ = stream.quit().await;

        if results.put(&result).await.is_err() || tasks.report_done(task).await.is_err() {
            return HandlerOutcome::ErrorSite;
        }
        HandlerOutcome::Done(result)
    }
}

/// A `550` response to `CWD` means the directory no longer exists; any other
/// failure is treated as a directory-level problem instead (permissions,
/// temporary server errors).
fn is_not_found(err: &FtpError) -> bool {
    matches!(err, FtpError::UnexpectedResponse(resp) if resp.status.to_string().starts_with('5'))
}

/// For listing lines whose format doesn't say whether an entry is a
/// directory (a bare UNIX symlink), probe by attempting to `CWD` into it and
/// immediately back out.
async fn probe_is_dir(stream: &mut AsyncFtpStream, parent: &str, name: &str) -> bool {
    let child = format!("{}/{name}", parent.trim_end_matches('/'));
    if stream.cwd(&child).await.is_ok() {
        let _ = stream.cwd(parent).await;
        true
    } else {
        false
    }
}

/// Parse one `LIST` response line into `(name, is_dir)`; `is_dir` is `None`
/// when the format doesn't encode it directly (a UNIX symlink) and needs a
/// probe.
fn parse_list_line(line: &str) -> Option<(String, Option<bool>)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix('+') {
        return parse_eplf(rest);
    }
    parse_unix(line).or_else(|| parse_msdos(line))
}

fn parse_eplf(rest: &str) -> Option<(String, Option<bool>)> {
    let mut parts = rest.splitn(2, '\t');
    let facts = parts.next()?;
    let name = parts.next()?.to_string();
    if name.is_empty() {
        return None;
    }
    let mut is_dir = None;
    for fact in facts.split(',') {
        if fact.starts_with('/') {
            is_dir = Some(true);
        } else if fact.starts_with('r') {
            is_dir = Some(false);
        }
    }
    Some((name, is_dir))
}

fn parse_unix(line: &str) -> Option<(String, Option<bool>)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }
    let first = fields[0].chars().next()?;
    if !matches!(first, 'd' | '-' | 'l' | 'b' | 'c' | 'p' | 's') {
        return None;
    }
    let is_dir = match first {
        'd' => Some(true),
        'l' => None,
        _ => Some(false),
    };
    let mut name = fields[8..].join(" ");
    if first == 'l'
        && let Some(idx) = name.find(" -> ")
    {
        name.truncate(idx);
    }
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some((name, is_dir))
}

fn parse_msdos(line: &str) -> Option<(String, Option<bool>)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    let is_dir = fields[2].eq_ignore_ascii_case("<DIR>");
    let name = fields[3..].join(" ");
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some((name, Some(is_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_directory_line() {
        let (name, is_dir) =
            parse_list_line("drwxr-xr-x   2 user group     4096 Jan 01 12:00 pub").unwrap();
        assert_eq!(name, "pub");
        assert_eq!(is_dir, Some(true));
    }

    #[test]
    fn parses_unix_file_line() {
        let (name, is_dir) =
            parse_list_line("-rw-r--r--   1 user group     1234 Jan 01 12:00 readme.txt")
                .unwrap();
        assert_eq!(name, "readme.txt");
        assert_eq!(is_dir, Some(false));
    }

    #[test]
    fn unix_symlink_is_ambiguous() {
        let (name, is_dir) = parse_list_line(
            "lrwxrwxrwx   1 user group       10 Jan 01 12:00 current -> releases/1",
        )
        .unwrap();
        assert_eq!(name, "current");
        assert_eq!(is_dir, None);
    }

    #[test]
    fn parses_msdos_directory_line() {
        let (name, is_dir) =
            parse_list_line("01-01-26  12:00AM       <DIR>          pub").unwrap();
        assert_eq!(name, "pub");
        assert_eq!(is_dir, Some(true));
    }

    #[test]
    fn parses_msdos_file_line() {
        let (name, is_dir) =
            parse_list_line("01-01-26  12:00AM             1234 readme.txt").unwrap();
        assert_eq!(name, "readme.txt");
        assert_eq!(is_dir, Some(false));
    }

    #[test]
    fn parses_eplf_line() {
        let (name, is_dir) = parse_list_line("+i8388621.48594,m825718503,/,\tpub").unwrap();
        assert_eq!(name, "pub");
        assert_eq!(is_dir, Some(true));
    }

    #[test]
    fn skips_dot_entries() {
        assert!(
            parse_list_line("drwxr-xr-x   2 user group     4096 Jan 01 12:00 .").is_none()
        );
    }
}
