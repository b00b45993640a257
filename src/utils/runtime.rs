use std::process;

/// Signal handling and the socket loop assume a POSIX host.
pub fn ensure_posix_or_exit() {
    if !cfg!(unix) {
        eprintln!("unsupported platform: acsgate runs on POSIX systems only");
        process::exit(2);
    }
}
