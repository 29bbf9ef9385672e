use std::path::PathBuf;

/// Path of the daemon binary, which is installed next to the cli.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("focusgate-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::to_daemon_path;

    #[test]
    fn daemon_lives_next_to_cli() {
        assert_eq!(
            to_daemon_path(PathBuf::from("/usr/local/bin/focusgate")),
            PathBuf::from("/usr/local/bin/focusgate-daemon")
        );
    }
}
