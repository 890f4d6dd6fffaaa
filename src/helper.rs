use nix::libc;
use std::error::Error;

pub type DynError = Box<dyn Error + Send + Sync + 'static>;

/// System call wrapper. Retries on EINTR
pub fn syscall<F, T>(f: F) -> Result<T, nix::Error>
where
    F: Fn() -> Result<T, nix::Error>,
{
    loop {
        match f() {
            Err(nix::Error::EINTR) => (), // retry
            result => return result,
        }
    }
}

/// Type that calls the closure f when dropped
pub struct CleanUp<F>
where
    F: FnMut(),
{
    pub f: F,
}

impl<F> Drop for CleanUp<F>
where
    F: FnMut(),
{
    fn drop(&mut self) {
        (self.f)()
    }
}

/// Terminates a forked child without running any of the parent's exit hooks.
/// The pieces of `msg` are written to stderr first. Only async-signal-safe calls are made,
/// so nothing here allocates.
pub fn child_exit(msg: &[&[u8]], code: i32) -> ! {
    for part in msg {
        let _ = nix::unistd::write(libc::STDERR_FILENO, part);
    }
    unsafe { libc::_exit(code) }
}
