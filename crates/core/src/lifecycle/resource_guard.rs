use std::ops::{Deref, DerefMut};

/// A resource with an explicit release step (capture handle, writer,
/// scratch file).
///
/// `release` is only ever called once per guard; implementations may still
/// be idempotent on their own.
pub trait Release {
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Scoped owner that releases its resource exactly once.
///
/// Release happens on the first explicit `release()` call, or on drop if no
/// explicit release ran. Errors surfaced on drop are logged, since there is
/// nobody left to return them to.
pub struct ResourceGuard<T: Release> {
    label: &'static str,
    // Only `into_inner` takes it, and that consumes the guard.
    inner: Option<T>,
    released: bool,
}

impl<T: Release> ResourceGuard<T> {
    pub fn new(label: &'static str, inner: T) -> Self {
        Self {
            label,
            inner: Some(inner),
            released: false,
        }
    }

    /// Releases the resource. Later calls are no-ops returning `Ok`.
    pub fn release(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        log::debug!("Releasing {}", self.label);
        match self.inner.as_mut() {
            Some(inner) => inner.release(),
            None => Ok(()),
        }
    }

    /// Releases the resource (if not already released) and hands it back,
    /// so a closed capture handle can be reopened later.
    pub fn into_inner(mut self) -> (T, Result<(), Box<dyn std::error::Error>>) {
        let result = self.release();
        let inner = self
            .inner
            .take()
            .expect("resource guard holds its resource until consumed");
        (inner, result)
    }
}

impl<T: Release> Deref for ResourceGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner
            .as_ref()
            .expect("resource guard holds its resource until consumed")
    }
}

impl<T: Release> DerefMut for ResourceGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner
            .as_mut()
            .expect("resource guard holds its resource until consumed")
    }
}

impl<T: Release> Drop for ResourceGuard<T> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to release {}: {e}", self.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Counted {
        releases: Arc<Mutex<usize>>,
        fail: bool,
    }

    impl Counted {
        fn new(fail: bool) -> (Self, Arc<Mutex<usize>>) {
            let releases = Arc::new(Mutex::new(0));
            (
                Self {
                    releases: releases.clone(),
                    fail,
                },
                releases,
            )
        }
    }

    impl Release for Counted {
        fn release(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            *self.releases.lock().unwrap() += 1;
            if self.fail {
                Err("release failed".into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_drop_releases_once() {
        let (res, releases) = Counted::new(false);
        {
            let _guard = ResourceGuard::new("counted", res);
        }
        assert_eq!(*releases.lock().unwrap(), 1);
    }

    #[test]
    fn test_explicit_release_is_not_repeated_on_drop() {
        let (res, releases) = Counted::new(false);
        let mut guard = ResourceGuard::new("counted", res);
        guard.release().unwrap();
        guard.release().unwrap();
        drop(guard);
        assert_eq!(*releases.lock().unwrap(), 1);
    }

    #[test]
    fn test_failed_release_is_reported_once() {
        let (res, releases) = Counted::new(true);
        let mut guard = ResourceGuard::new("counted", res);
        assert!(guard.release().is_err());
        assert!(guard.release().is_ok());
        drop(guard);
        assert_eq!(*releases.lock().unwrap(), 1);
    }

    #[test]
    fn test_release_on_error_path() {
        fn fallible(res: Counted) -> Result<(), String> {
            let _guard = ResourceGuard::new("counted", res);
            Err("mid-stream failure".into())
        }

        let (res, releases) = Counted::new(false);
        assert!(fallible(res).is_err());
        assert_eq!(*releases.lock().unwrap(), 1);
    }

    #[test]
    fn test_into_inner_releases_and_returns_resource() {
        let (res, releases) = Counted::new(false);
        let guard = ResourceGuard::new("counted", res);
        let (inner, result) = guard.into_inner();
        assert!(result.is_ok());
        assert_eq!(*releases.lock().unwrap(), 1);

        // Dropping the returned resource does not release it again.
        drop(inner);
        assert_eq!(*releases.lock().unwrap(), 1);
    }

    #[test]
    fn test_into_inner_after_explicit_release() {
        let (res, releases) = Counted::new(false);
        let mut guard = ResourceGuard::new("counted", res);
        guard.release().unwrap();
        let (inner, result) = guard.into_inner();
        assert!(result.is_ok());
        assert_eq!(*releases.lock().unwrap(), 1);

        // The returned resource can be guarded again after reuse.
        drop(ResourceGuard::new("counted", inner));
        assert_eq!(*releases.lock().unwrap(), 2);
    }
}
