//! Raw terminal mode and a `poll(2)`-based readiness primitive that
//! multiplexes stdin with an optional control FIFO, per spec.md §4.8 "a
//! single readiness primitive with a configurable per-read timeout". The
//! teacher's crates never reach for `mio`/`tokio` for blocking stdin work,
//! so this wraps raw `libc::poll` directly instead of pulling in an async
//! runtime for one fd pair.

use std::fs::File;
use std::io::Read;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};

pub struct RawTerm {
    original: libc::termios,
    fd: RawFd,
}

impl RawTerm {
    /// Puts stdin into non-canonical, no-echo mode so single keystrokes are
    /// readable without waiting for Enter.
    pub fn enable() -> std::io::Result<Self> {
        let fd = libc::STDIN_FILENO;
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut original) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self { original, fd })
    }
}

impl Drop for RawTerm {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSANOW, &self.original);
        }
    }
}

/// What produced readable input on the last `wait` call.
pub enum Ready {
    Stdin,
    Fifo,
    Timeout,
}

/// Polls stdin and an optional control-FIFO fd together, returning as soon
/// as either is readable or `timeout_ms` elapses (the once-per-second
/// play-clock tick).
pub struct InputMux {
    fifo: Option<File>,
}

impl InputMux {
    pub fn new(fifo: Option<File>) -> Self {
        Self { fifo }
    }

    pub fn wait(&self, timeout_ms: i32) -> std::io::Result<Ready> {
        let mut fds = vec![libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        }];
        if let Some(fifo) = &self.fifo {
            fds.push(libc::pollfd {
                fd: fifo.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
        }
        let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if n == 0 {
            return Ok(Ready::Timeout);
        }
        if fds[0].revents & libc::POLLIN != 0 {
            return Ok(Ready::Stdin);
        }
        if fds.len() > 1 && fds[1].revents & libc::POLLIN != 0 {
            return Ok(Ready::Fifo);
        }
        Ok(Ready::Timeout)
    }

    pub fn read_fifo_key(&mut self) -> std::io::Result<Option<char>> {
        let Some(fifo) = &mut self.fifo else { return Ok(None) };
        let mut buf = [0u8; 1];
        match fifo.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0] as char)),
            Err(e) => Err(e),
        }
    }

    pub fn read_stdin_key(&self) -> std::io::Result<Option<char>> {
        let mut buf = [0u8; 1];
        match std::io::stdin().read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0] as char)),
            Err(e) => Err(e),
        }
    }
}

/// Opens the control FIFO, or returns `None` with a warning if the path
/// doesn't refer to a FIFO (or doesn't exist), per spec.md §6.
pub fn open_control_fifo(path: &std::path::Path) -> Option<File> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => {
            match std::fs::OpenOptions::new().read(true).custom_flags(libc::O_NONBLOCK).open(path) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to open control FIFO");
                    None
                }
            }
        }
        Ok(_) => {
            tracing::warn!(path = %path.display(), "control FIFO path exists but is not a FIFO, ignoring");
            None
        }
        Err(_) => None,
    }
}
