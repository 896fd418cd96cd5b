//! OS signal bridging.
//!
//! - Resize: on unix a `SIGWINCH` action is installed for the lifetime of a
//!   running overlay. The handler only writes a byte into a self-pipe; the
//!   render context reads the pipe and turns each wakeup into a repaint
//!   request. The action that was installed before is saved and put back
//!   verbatim on uninstall.
//! - Interrupt: `forward_interrupt` raises `SIGINT` for the whole process so
//!   Ctrl+C still interrupts the program while the overlay holds raw mode.
//!   Where the process has no handler for it, the default action applies
//!   (usually termination); this is host behavior, not something the overlay
//!   can decide.

/// Whether the caller runs on the process's main thread.
pub fn on_main_thread() -> bool {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: gettid and getpid have no preconditions.
        unsafe { libc::gettid() == libc::getpid() }
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::thread::current().name() == Some("main")
    }
}

/// Delivers a process-level interrupt.
pub fn forward_interrupt() {
    #[cfg(unix)]
    {
        // SAFETY: getpid has no preconditions; kill with a valid pid and
        // signal number only queues the signal.
        let rc = unsafe { libc::kill(libc::getpid(), libc::SIGINT) };
        if rc != 0 {
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "failed to forward interrupt"
            );
        }
    }
    #[cfg(not(unix))]
    {
        pbar_core::interrupt::trigger();
    }
}

#[cfg(unix)]
pub use unix::ResizeHook;

#[cfg(unix)]
mod unix {
    use std::io;
    use std::mem::MaybeUninit;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::ptr;
    use std::sync::atomic::{AtomicI32, Ordering};

    use anyhow::{Context, Result};

    /// Write end of the active hook's pipe, or -1.
    static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

    extern "C" fn on_sigwinch(_signal: libc::c_int) {
        let fd = WAKE_FD.load(Ordering::Relaxed);
        if fd >= 0 {
            let byte = 1u8;
            // SAFETY: write(2) is async-signal-safe. The pipe is non-blocking,
            // so a full pipe drops the byte, which is fine: one pending
            // wakeup is enough.
            unsafe {
                libc::write(fd, ptr::from_ref(&byte).cast(), 1);
            }
        }
    }

    fn handler_address() -> libc::sighandler_t {
        on_sigwinch as extern "C" fn(libc::c_int) as libc::sighandler_t
    }

    /// Installed `SIGWINCH` action. Restores the previous one on
    /// `uninstall` or drop.
    pub struct ResizeHook {
        previous: Option<libc::sigaction>,
        reader: Option<UnixStream>,
        writer: UnixStream,
    }

    impl ResizeHook {
        /// # Errors
        /// Returns an error if the pipe or the signal action cannot be set up.
        pub fn install() -> Result<Self> {
            let (reader, writer) = UnixStream::pair().context("Failed to create resize pipe")?;
            reader
                .set_nonblocking(true)
                .context("Failed to configure resize pipe")?;
            writer
                .set_nonblocking(true)
                .context("Failed to configure resize pipe")?;
            WAKE_FD.store(writer.as_raw_fd(), Ordering::SeqCst);

            // SAFETY: zeroed sigaction is a valid "no flags, empty mask" value
            // that is filled in below before use.
            let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
            action.sa_sigaction = handler_address();
            action.sa_flags = libc::SA_RESTART;
            let mut previous = MaybeUninit::<libc::sigaction>::zeroed();
            // SAFETY: both pointers are valid; the handler only touches an
            // atomic and calls write(2).
            let rc = unsafe {
                libc::sigemptyset(&raw mut action.sa_mask);
                libc::sigaction(libc::SIGWINCH, &raw const action, previous.as_mut_ptr())
            };
            if rc != 0 {
                WAKE_FD.store(-1, Ordering::SeqCst);
                return Err(io::Error::last_os_error()).context("Failed to install SIGWINCH handler");
            }

            Ok(Self {
                // SAFETY: sigaction succeeded and filled the struct.
                previous: Some(unsafe { previous.assume_init() }),
                reader: Some(reader),
                writer,
            })
        }

        /// Read end of the wakeup pipe; each readable byte is one resize.
        pub fn take_reader(&mut self) -> Option<UnixStream> {
            self.reader.take()
        }

        /// Handler that was installed before this hook.
        pub fn previous_handler(&self) -> Option<libc::sighandler_t> {
            self.previous.as_ref().map(|a| a.sa_sigaction)
        }

        /// Restores the previous action.
        ///
        /// # Errors
        /// Returns an error if the previous action cannot be reinstalled.
        pub fn uninstall(mut self) -> Result<()> {
            self.restore()
        }

        fn restore(&mut self) -> Result<()> {
            let Some(previous) = self.previous.take() else {
                return Ok(());
            };
            // SAFETY: `previous` came from sigaction and is a valid action.
            let rc = unsafe { libc::sigaction(libc::SIGWINCH, &raw const previous, ptr::null_mut()) };
            let _ = WAKE_FD.compare_exchange(
                self.writer.as_raw_fd(),
                -1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            if rc != 0 {
                return Err(io::Error::last_os_error())
                    .context("Failed to restore previous SIGWINCH handler");
            }
            Ok(())
        }
    }

    impl Drop for ResizeHook {
        fn drop(&mut self) {
            let _ = self.restore();
        }
    }

    #[cfg(test)]
    mod tests {
        use std::io::Read;
        use std::time::{Duration, Instant};

        use super::*;

        /// Reads the current `SIGWINCH` disposition.
        fn current_action() -> io::Result<libc::sigaction> {
            let mut current = MaybeUninit::<libc::sigaction>::zeroed();
            // SAFETY: a null new action only queries; `current` is valid for writes.
            let rc = unsafe { libc::sigaction(libc::SIGWINCH, ptr::null(), current.as_mut_ptr()) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            // SAFETY: sigaction succeeded and filled the struct.
            Ok(unsafe { current.assume_init() })
        }

        // One test: SIGWINCH disposition is process-wide.
        #[test]
        fn test_install_wakes_pipe_and_uninstall_restores_previous() {
            let before = current_action().unwrap().sa_sigaction;

            let mut hook = ResizeHook::install().unwrap();
            assert_eq!(hook.previous_handler(), Some(before));
            assert_eq!(current_action().unwrap().sa_sigaction, handler_address());

            let mut reader = hook.take_reader().unwrap();
            // SAFETY: raising a signal whose handler we just installed.
            unsafe {
                libc::raise(libc::SIGWINCH);
            }

            let deadline = Instant::now() + Duration::from_secs(1);
            let mut buf = [0u8; 8];
            let read = loop {
                match reader.read(&mut buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline => {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Err(e) => panic!("no wakeup byte: {e}"),
                }
            };
            assert!(read >= 1);

            hook.uninstall().unwrap();
            assert_eq!(current_action().unwrap().sa_sigaction, before);
        }
    }
}
