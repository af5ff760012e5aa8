use core::{ffi::c_int, fmt};

use crate::pr_warn;

/// Largest errno value the kernel hands out (`include/linux/err.h`).
pub const MAX_ERRNO: c_int = 4095;

pub type KernelResult<T = ()> = Result<T, Error>;

/// A kernel status code.
///
/// # Invariants
///
/// The inner value is a negative errno, i.e. `>= -MAX_ERRNO && < 0`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Error(c_int);

impl Error {
    /// Creates an [`Error`] from a kernel status code.
    ///
    /// Codes outside of the errno range are reported and replaced by `EINVAL`.
    pub fn from_errno(errno: c_int) -> Error {
        if errno < -MAX_ERRNO || errno >= 0 {
            pr_warn!(
                "attempted to create `Error` with out of range `errno`: {}\n",
                errno
            );
            return linux_err::EINVAL;
        }
        // INVARIANT: The check above ensures the type invariant
        // will hold.
        Error(errno)
    }

    /// Turns a C-style return value (`>= 0` success, `< 0` errno) into a [`KernelResult`].
    pub fn to_result(ret: c_int) -> KernelResult<c_int> {
        if ret < 0 {
            Err(Error::from_errno(ret))
        } else {
            Ok(ret)
        }
    }

    pub fn to_errno(&self) -> c_int {
        self.0
    }

    /// Returns a string representing the error, if one exists.
    pub fn name(&self) -> Option<&'static str> {
        linux_err::name_of(self.0)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            // Print out number if no name can be found.
            None => f.debug_tuple("Error").field(&-self.0).finish(),
            Some(name) => f.debug_tuple(name).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            None => write!(f, "{}", self.0),
            Some(name) => write!(f, "{} ({})", self.0, name),
        }
    }
}

/// Contains the C-compatible error codes.
#[rustfmt::skip]
#[allow(unused)]
pub mod linux_err {
    use core::ffi::c_int;

    macro_rules! declare_err {
        ($($err:ident = $num:literal, $doc:expr;)*) => {
            $(
            #[doc = $doc]
            pub const $err: super::Error = super::Error(-$num);
            )*

            pub(super) fn name_of(errno: c_int) -> Option<&'static str> {
                match errno.checked_neg()? {
                    $($num => Some(stringify!($err)),)*
                    _ => None,
                }
            }
        };
    }

    declare_err! {
        EPERM = 1, "Operation not permitted.";
        ENOENT = 2, "No such file or directory.";
        ESRCH = 3, "No such process.";
        EINTR = 4, "Interrupted system call.";
        EIO = 5, "I/O error.";
        ENXIO = 6, "No such device or address.";
        E2BIG = 7, "Argument list too long.";
        ENOEXEC = 8, "Exec format error.";
        EBADF = 9, "Bad file number.";
        ECHILD = 10, "No child processes.";
        EAGAIN = 11, "Try again.";
        ENOMEM = 12, "Out of memory.";
        EACCES = 13, "Permission denied.";
        EFAULT = 14, "Bad address.";
        ENOTBLK = 15, "Block device required.";
        EBUSY = 16, "Device or resource busy.";
        EEXIST = 17, "File exists.";
        EXDEV = 18, "Cross-device link.";
        ENODEV = 19, "No such device.";
        ENOTDIR = 20, "Not a directory.";
        EISDIR = 21, "Is a directory.";
        EINVAL = 22, "Invalid argument.";
        ENFILE = 23, "File table overflow.";
        EMFILE = 24, "Too many open files.";
        ENOTTY = 25, "Not a typewriter.";
        ETXTBSY = 26, "Text file busy.";
        EFBIG = 27, "File too large.";
        ENOSPC = 28, "No space left on device.";
        ESPIPE = 29, "Illegal seek.";
        EROFS = 30, "Read-only file system.";
        EMLINK = 31, "Too many links.";
        EPIPE = 32, "Broken pipe.";
        EDOM = 33, "Math argument out of domain of func.";
        ERANGE = 34, "Math result not representable.";
        ENAMETOOLONG = 36, "File name too long.";
        ERESTARTSYS = 512, "Restart the system call.";
        ENOIOCTLCMD = 515, "No ioctl command.";
        ENOTSUPP = 524, "Operation is not supported.";
    }
}
