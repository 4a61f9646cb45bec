//! Background loading
//!
//! A load shells out to the menu generator and can take many seconds.
//! `MenuHandle` owns the menu behind a mutex and runs loads on a worker
//! thread while the caller polls `LoadStatus` for progress and may
//! request cancellation. Only one load runs at a time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::info;

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;

/// Progress shared between a running load and its observers.
#[derive(Debug, Default)]
pub struct LoadStatus {
    /// f64 bit pattern; atomics carry no floats directly.
    progress: AtomicU64,
    label: Mutex<String>,
    cancel: AtomicBool,
}

impl LoadStatus {
    pub fn set(&self, progress: f64, label: &str) {
        self.progress.store(progress.to_bits(), Ordering::Relaxed);
        if let Ok(mut slot) = self.label.lock() {
            label.clone_into(&mut slot);
        }
    }

    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub fn label(&self) -> String {
        self.label.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.set(0.0, "");
        self.cancel.store(false, Ordering::Relaxed);
    }
}

/// Shared handle over a menu and its load machinery.
#[derive(Clone)]
pub struct MenuHandle {
    menu: Arc<Mutex<Menu>>,
    status: Arc<LoadStatus>,
    loading: Arc<AtomicBool>,
}

impl MenuHandle {
    pub fn new(menu: Menu) -> Self {
        MenuHandle {
            menu: Arc::new(Mutex::new(menu)),
            status: Arc::new(LoadStatus::default()),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// Blocks until the menu is free. Poisoning cannot be recovered from
    /// here; the menu state is gone with the panicking thread.
    pub fn lock(&self) -> Result<MutexGuard<'_, Menu>> {
        self.menu
            .lock()
            .map_err(|_| Error::Invariant("menu mutex poisoned".into()))
    }

    /// Non-blocking variant for rendering progress while a load holds the
    /// lock.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Menu>> {
        self.menu.try_lock().ok()
    }

    /// Starts a load on a worker thread. Fails fast when one is running.
    pub fn spawn_load(&self) -> Result<JoinHandle<Result<()>>> {
        if self.loading.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyLoading);
        }
        self.status.reset();

        let menu = Arc::clone(&self.menu);
        let status = Arc::clone(&self.status);
        let loading = Arc::clone(&self.loading);
        let handle = std::thread::spawn(move || {
            let result = match menu.lock() {
                Ok(mut menu) => menu.load(&status),
                Err(_) => Err(Error::Invariant("menu mutex poisoned".into())),
            };
            loading.store(false, Ordering::SeqCst);
            if let Err(e) = &result {
                info!(error = %e, "load finished with error");
            }
            result
        });
        Ok(handle)
    }

    /// Runs a load on the calling thread.
    pub fn load_blocking(&self) -> Result<()> {
        if self.loading.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyLoading);
        }
        self.status.reset();
        let result = match self.lock() {
            Ok(mut menu) => menu.load(&self.status),
            Err(e) => Err(e),
        };
        self.loading.store(false, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_progress_and_label() {
        let status = LoadStatus::default();
        assert_eq!(status.progress(), 0.0);
        status.set(0.35, "running generator");
        assert_eq!(status.progress(), 0.35);
        assert_eq!(status.label(), "running generator");
        assert!(!status.is_cancelled());
        status.request_cancel();
        assert!(status.is_cancelled());
    }
}
