//! Hooks used by tests to force the rename step of the atomic helpers to
//! fail, so temp-file cleanup and the copy+remove fallback get exercised.
//! They only do something when the `test-helpers` feature is enabled; the
//! fallbacks below keep the call sites in `helpers` compiling otherwise.
//!
//! The flags are per thread, so a test flipping one never affects the
//! atomic writes of tests running next to it.

#[cfg(feature = "test-helpers")]
mod hooks {
    use std::cell::Cell;

    thread_local! {
        static FORCE_RENAME_FAIL_IN_COPY: Cell<bool> = const { Cell::new(false) };
        static FORCE_RENAME_FAIL_IN_WRITE: Cell<bool> = const { Cell::new(false) };
        static FORCE_RENAME_FAIL_IN_RENAME_OR_COPY: Cell<bool> = const { Cell::new(false) };
    }

    pub fn set_force_rename_fail_in_copy(v: bool) {
        FORCE_RENAME_FAIL_IN_COPY.with(|f| f.set(v));
    }
    pub fn should_force_rename_fail_in_copy() -> bool {
        FORCE_RENAME_FAIL_IN_COPY.with(Cell::get)
    }

    pub fn set_force_rename_fail_in_write(v: bool) {
        FORCE_RENAME_FAIL_IN_WRITE.with(|f| f.set(v));
    }
    pub fn should_force_rename_fail_in_write() -> bool {
        FORCE_RENAME_FAIL_IN_WRITE.with(Cell::get)
    }

    pub fn set_force_rename_fail_in_rename_or_copy(v: bool) {
        FORCE_RENAME_FAIL_IN_RENAME_OR_COPY.with(|f| f.set(v));
    }
    pub fn should_force_rename_fail_in_rename_or_copy() -> bool {
        FORCE_RENAME_FAIL_IN_RENAME_OR_COPY.with(Cell::get)
    }
}

#[cfg(not(feature = "test-helpers"))]
mod hooks {
    pub fn set_force_rename_fail_in_copy(_v: bool) {}
    pub fn should_force_rename_fail_in_copy() -> bool {
        false
    }

    pub fn set_force_rename_fail_in_write(_v: bool) {}
    pub fn should_force_rename_fail_in_write() -> bool {
        false
    }

    pub fn set_force_rename_fail_in_rename_or_copy(_v: bool) {}
    pub fn should_force_rename_fail_in_rename_or_copy() -> bool {
        false
    }
}

pub use hooks::*;
