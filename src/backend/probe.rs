//! Host capability probes
//!
//! Read-only existence checks used by the selector. Both probes are plain
//! metadata lookups: they never execute the candidate, so they cannot hang
//! on external-tool behavior.

use std::env;
use std::path::Path;

/// Check whether a video device node exists
pub fn device_node_present(path: &Path) -> bool {
    path.exists()
}

/// Check whether an executable is reachable via `PATH`
pub fn binary_on_path(name: &str) -> bool {
    match env::var_os("PATH") {
        Some(paths) => binary_in(name, &paths),
        None => false,
    }
}

fn binary_in(name: &str, paths: &std::ffi::OsStr) -> bool {
    env::split_paths(paths).any(|dir| {
        let candidate = dir.join(name);
        candidate.is_file()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_device_node_present() {
        assert!(device_node_present(Path::new("/dev/null")));
        assert!(!device_node_present(Path::new("/dev/picast-no-such-node")));
    }

    #[test]
    fn test_binary_in_explicit_path() {
        let paths = OsString::from("/usr/bin:/bin");
        assert!(binary_in("sh", &paths));
        assert!(!binary_in("picast-no-such-binary", &paths));
    }

    #[test]
    fn test_binary_on_real_path() {
        // sh is present on any host this crate targets
        assert!(binary_on_path("sh"));
        assert!(!binary_on_path("picast-no-such-binary"));
    }
}
