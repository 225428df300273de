//! `perf` symbol map
//!
//! Lines of `<start> <size> <name>` (hex) appended to `/tmp/perf-<pid>.map`
//! so `perf report` can name generated code. The map is append-only:
//! invalidating code does not remove its line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::PathBuf;

use tracing::warn;

use crate::config::PerfMapMode;

#[derive(Debug)]
pub struct PerfMap {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl PerfMap {
    pub fn disabled() -> Self {
        PerfMap { file: None, path: None }
    }

    /// Open the map for `mode`; an open failure disables the map
    pub fn open(mode: &PerfMapMode) -> Self {
        let path = match mode {
            PerfMapMode::Disabled => return Self::disabled(),
            PerfMapMode::Enabled => default_path(),
            PerfMapMode::Path(path) => path.clone(),
        };
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => PerfMap {
                file: Some(file),
                path: Some(path),
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot open perf map, disabling it");
                Self::disabled()
            }
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Append one entry; a write failure disables the map
    pub fn record(&mut self, range: &Range<usize>, name: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let line = format!("{:x} {:x} {}\n", range.start, range.end - range.start, name);
        if let Err(err) = file.write_all(line.as_bytes()) {
            warn!(error = %err, "cannot write perf map, disabling it");
            self.file = None;
        }
    }
}

/// `/tmp/perf-<pid>.map`
pub fn default_path() -> PathBuf {
    PathBuf::from(format!("/tmp/perf-{}.map", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("v4vm-perf-{}-{tag}.map", std::process::id()))
    }

    #[test]
    fn test_default_path() {
        let path = default_path();
        assert_eq!(path, PathBuf::from(format!("/tmp/perf-{}.map", std::process::id())));
    }

    #[test]
    fn test_append_lines() {
        let path = temp_path("append");
        let _ = std::fs::remove_file(&path);
        let mut map = PerfMap::open(&PerfMapMode::Path(path.clone()));
        assert!(map.is_enabled());
        map.record(&(0x1000..0x1020), "first");
        map.record(&(0x2000..0x2008), "second");
        drop(map);

        // reopening appends
        let mut map = PerfMap::open(&PerfMapMode::Path(path.clone()));
        map.record(&(0x3000..0x3001), "third");
        drop(map);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1000 20 first\n2000 8 second\n3000 1 third\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_failure_disables() {
        let path = PathBuf::from("/nonexistent-dir/v4vm/perf.map");
        let mut map = PerfMap::open(&PerfMapMode::Path(path));
        assert!(!map.is_enabled());
        // recording into a disabled map is a no-op
        map.record(&(0..1), "ignored");
    }

    #[test]
    fn test_disabled_mode() {
        assert!(!PerfMap::open(&PerfMapMode::Disabled).is_enabled());
    }
}
