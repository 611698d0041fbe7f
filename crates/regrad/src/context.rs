// Execution context: where a training run is pinned
//
// Host runs need nothing. An accelerator run takes a process-wide lock for
// its device ordinal and holds it for the whole training call, so two fits
// never share a device. The lock lives in a ContextGuard:
//
//   - the guard wraps a MutexGuard, which is !Send, so the run stays on the
//     OS thread that acquired the device
//   - dropping the guard releases the device on every exit path, errors and
//     panics included
//
// All arithmetic still runs on the host. There is no device code.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use regrad_core::{Error, Result};

/// Number of accelerator ordinals that can be addressed.
pub const MAX_ACCELERATORS: usize = 8;

#[allow(clippy::declare_interior_mutable_const)]
const UNLOCKED: Mutex<()> = Mutex::new(());
static DEVICE_LOCKS: [Mutex<()>; MAX_ACCELERATORS] = [UNLOCKED; MAX_ACCELERATORS];

/// Where a training run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionContext {
    /// Ordinary CPU execution, no exclusive resources.
    #[default]
    Host,
    /// Exclusive use of accelerator `ordinal` for the duration of the run.
    Accelerator { ordinal: usize },
}

impl ExecutionContext {
    pub fn accelerator(ordinal: usize) -> Self {
        ExecutionContext::Accelerator { ordinal }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, ExecutionContext::Host)
    }

    /// Reject ordinals outside `0..MAX_ACCELERATORS`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            ExecutionContext::Accelerator { ordinal } if ordinal >= MAX_ACCELERATORS => {
                Err(Error::config(format!(
                    "accelerator ordinal {ordinal} out of range (0..{MAX_ACCELERATORS})"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Enter this context, blocking until the device is free.
    pub fn acquire(&self) -> Result<ContextGuard> {
        self.validate()?;
        let lock = match *self {
            ExecutionContext::Host => None,
            ExecutionContext::Accelerator { ordinal } => Some(
                DEVICE_LOCKS[ordinal]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            ),
        };
        Ok(ContextGuard::new(*self, lock))
    }

    /// Enter this context only if the device is free right now.
    ///
    /// Returns `Ok(None)` when another run holds the device.
    pub fn try_acquire(&self) -> Result<Option<ContextGuard>> {
        self.validate()?;
        let lock = match *self {
            ExecutionContext::Host => None,
            ExecutionContext::Accelerator { ordinal } => match DEVICE_LOCKS[ordinal].try_lock() {
                Ok(guard) => Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => return Ok(None),
            },
        };
        Ok(Some(ContextGuard::new(*self, lock)))
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Host => f.write_str("host"),
            ExecutionContext::Accelerator { ordinal } => write!(f, "accelerator:{ordinal}"),
        }
    }
}

impl FromStr for ExecutionContext {
    type Err = Error;

    /// Accepts `host`, `accelerator:N`, or a bare ordinal `N`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "host" {
            return Ok(ExecutionContext::Host);
        }
        let ordinal = s.strip_prefix("accelerator:").unwrap_or(s.as_str());
        let ordinal: usize = ordinal
            .parse()
            .map_err(|_| Error::config(format!("invalid execution context '{s}'")))?;
        let context = ExecutionContext::Accelerator { ordinal };
        context.validate()?;
        Ok(context)
    }
}

/// Scoped ownership of an [`ExecutionContext`].
///
/// Not `Send`: the run must finish on the thread that acquired it.
pub struct ContextGuard {
    context: ExecutionContext,
    _lock: Option<MutexGuard<'static, ()>>,
}

impl ContextGuard {
    fn new(context: ExecutionContext, lock: Option<MutexGuard<'static, ()>>) -> Self {
        if !context.is_host() {
            log::debug!("acquired {context}");
        }
        Self {
            context,
            _lock: lock,
        }
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if !self.context.is_host() {
            log::debug!("released {}", self.context);
        }
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrad_core::ErrorKind;

    #[test]
    fn host_never_blocks() {
        let a = ExecutionContext::Host.acquire().unwrap();
        let b = ExecutionContext::Host.try_acquire().unwrap();
        assert!(b.is_some());
        assert_eq!(a.context(), ExecutionContext::Host);
    }

    #[test]
    fn accelerator_is_exclusive_until_dropped() {
        let ctx = ExecutionContext::accelerator(7);
        let guard = ctx.acquire().unwrap();
        assert!(ctx.try_acquire().unwrap().is_none());
        drop(guard);
        assert!(ctx.try_acquire().unwrap().is_some());
    }

    #[test]
    fn ordinals_are_independent() {
        let _six = ExecutionContext::accelerator(6).acquire().unwrap();
        assert!(ExecutionContext::accelerator(5)
            .try_acquire()
            .unwrap()
            .is_some());
    }

    #[test]
    fn out_of_range_ordinal() {
        let err = ExecutionContext::accelerator(MAX_ACCELERATORS)
            .acquire()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn parse_contexts() {
        assert_eq!(
            "host".parse::<ExecutionContext>().unwrap(),
            ExecutionContext::Host
        );
        assert_eq!(
            "accelerator:2".parse::<ExecutionContext>().unwrap(),
            ExecutionContext::accelerator(2)
        );
        assert_eq!(
            "3".parse::<ExecutionContext>().unwrap(),
            ExecutionContext::accelerator(3)
        );
        assert!("gpu".parse::<ExecutionContext>().is_err());
        assert!("accelerator:99".parse::<ExecutionContext>().is_err());
    }
}
