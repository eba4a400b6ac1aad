//! Process-wide table of driver instances
//!
//! The chip has a fixed number of controllers. A [`Registry`] placed in a
//! `static` maps each controller index to its driver, which is constructed
//! on first request and lives for the rest of the program.
//!
//! ```no_run
//! # use samv7_mcan::driver::LowerHalf;
//! # use samv7_mcan::registry::Registry;
//! # fn build<T>() -> T { unimplemented!() }
//! # fn demo<T: LowerHalf + Send + Sync + 'static>(registry: &'static Registry<T, 2>) {
//! let can0 = registry.get_or_init(0, build).unwrap();
//! can0.setup().unwrap();
//! # }
//! ```

use crate::bus::Error;
use crate::driver::LowerHalf;
use embassy_sync::once_lock::OnceLock;
use log::debug;

/// Drivers for up to `N` controllers
pub struct Registry<T, const N: usize> {
    slots: [OnceLock<T>; N],
}

impl<T, const N: usize> Registry<T, N> {
    /// Empty registry
    pub const fn new() -> Self {
        Self {
            slots: [const { OnceLock::new() }; N],
        }
    }

    /// The driver of controller `index`, if constructed
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.try_get()
    }
}

impl<T: LowerHalf, const N: usize> Registry<T, N> {
    /// The driver of controller `index`. On first request it is built with
    /// `init` and the controller is reset.
    pub fn get_or_init(&self, index: usize, init: impl FnOnce() -> T) -> Result<&T, Error> {
        let slot = self.slots.get(index).ok_or(Error::OutOfBounds)?;
        let mut created = false;
        let driver = slot.get_or_init(|| {
            created = true;
            init()
        });
        if created {
            debug!("registry: instance {} created", index);
            driver.reset();
        }
        Ok(driver)
    }
}

impl<T, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::Frame;
    use core::cell::Cell;

    struct Counter {
        resets: Cell<usize>,
    }

    impl LowerHalf for Counter {
        fn reset(&self) {
            self.resets.set(self.resets.get() + 1);
        }
        fn setup(&self) -> Result<(), Error> {
            Ok(())
        }
        fn shutdown(&self) {}
        fn rxint(&self, _: bool) {}
        fn txint(&self, _: bool) {}
        fn send(&self, _: &Frame) -> Result<(), Error> {
            Ok(())
        }
        fn tx_ready(&self) -> bool {
            true
        }
        fn tx_empty(&self) -> bool {
            true
        }
    }

    fn counter() -> Counter {
        Counter {
            resets: Cell::new(0),
        }
    }

    #[test]
    fn constructs_once_and_resets_once() {
        let registry = Registry::<Counter, 2>::new();
        assert!(registry.get(0).is_none());

        let first = registry.get_or_init(0, counter).unwrap();
        assert_eq!(first.resets.get(), 1);

        let again = registry
            .get_or_init(0, || panic!("constructed twice"))
            .unwrap();
        assert!(core::ptr::eq(first, again));
        assert_eq!(again.resets.get(), 1);
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn index_out_of_bounds() {
        let registry = Registry::<Counter, 2>::new();
        assert_eq!(
            registry.get_or_init(2, counter).err(),
            Some(Error::OutOfBounds)
        );
        assert!(registry.get(2).is_none());
    }
}
