//! `file://` URI helpers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

const FILE_SCHEME: &str = "file://";

/// Build a `file://` URI for `path`.
///
/// Relative paths are resolved against the current directory. Each path segment is
/// percent-encoded; separators are kept.
pub fn file_uri_from_path(path: &Path) -> Result<String> {
    let absolute =
        std::path::absolute(path).with_context(|| format!("resolve absolute path {path:?}"))?;
    let mut joined = encode_segments(&absolute);
    if !joined.starts_with('/') {
        // Windows drive paths ("C:/...") need the extra slash.
        joined.insert(0, '/');
    }
    Ok(format!("{FILE_SCHEME}{joined}"))
}

/// Parse a `file://` URI back into a filesystem path.
pub fn path_from_file_uri(uri: &str) -> Result<PathBuf> {
    let rest = uri
        .strip_prefix(FILE_SCHEME)
        .ok_or_else(|| anyhow!("unsupported uri scheme: {uri}"))?;
    if rest.is_empty() {
        return Err(anyhow!("empty file uri"));
    }
    decode_path(rest).with_context(|| format!("decode uri {uri}"))
}

#[cfg(unix)]
fn encode_segments(path: &Path) -> String {
    use std::os::unix::ffi::OsStrExt;

    path.as_os_str()
        .as_bytes()
        .split(|b| *b == b'/')
        .map(|segment| urlencoding::encode_binary(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn decode_path(encoded: &str) -> Result<PathBuf> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    Ok(PathBuf::from(OsStr::from_bytes(&bytes)))
}

#[cfg(not(unix))]
fn encode_segments(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(not(unix))]
fn decode_path(encoded: &str) -> Result<PathBuf> {
    let decoded = urlencoding::decode(encoded)?.into_owned();
    if let Some(stripped) = decoded.strip_prefix('/')
        && stripped.as_bytes().get(1) == Some(&b':')
    {
        return Ok(PathBuf::from(stripped));
    }
    Ok(PathBuf::from(decoded))
}

/// Base name shown in the file label.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn file_uri_keeps_plain_paths_readable() {
        let uri = file_uri_from_path(Path::new("/music/album/track.flac")).unwrap();
        assert_eq!(uri, "file:///music/album/track.flac");
    }

    #[cfg(unix)]
    #[test]
    fn file_uri_percent_encodes_segments() {
        let uri = file_uri_from_path(Path::new("/music/My Album/#1 song.mp3")).unwrap();
        assert_eq!(uri, "file:///music/My%20Album/%231%20song.mp3");
    }

    #[test]
    fn file_uri_resolves_relative_paths() {
        let uri = file_uri_from_path(Path::new("track.wav")).unwrap();
        assert!(uri.starts_with("file:///"));
        assert!(uri.ends_with("/track.wav"));
    }

    #[cfg(unix)]
    #[test]
    fn uri_round_trips_through_parser() {
        let path = Path::new("/tmp/deck player/ünïcode & co.ogg");
        let uri = file_uri_from_path(path).unwrap();
        assert_eq!(path_from_file_uri(&uri).unwrap(), path);
    }

    #[cfg(unix)]
    #[test]
    fn backslash_stays_part_of_the_file_name() {
        let path = Path::new("/music/AC\\DC - live.mp3");
        let uri = file_uri_from_path(path).unwrap();
        assert_eq!(uri, "file:///music/AC%5CDC%20-%20live.mp3");
        assert_eq!(path_from_file_uri(&uri).unwrap(), path);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_round_trip() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/music/caf\xe9.mp3"));
        let uri = file_uri_from_path(path).unwrap();
        assert_eq!(uri, "file:///music/caf%E9.mp3");
        assert_eq!(path_from_file_uri(&uri).unwrap(), path);
    }

    #[test]
    fn parser_rejects_other_schemes() {
        assert!(path_from_file_uri("http://example.com/a.flac").is_err());
        assert!(path_from_file_uri("file://").is_err());
    }

    #[test]
    fn display_name_is_base_name() {
        assert_eq!(display_name(Path::new("/music/a/b.flac")), "b.flac");
        assert_eq!(display_name(Path::new("b.flac")), "b.flac");
    }
}
