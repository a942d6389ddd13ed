//! Environment capabilities, detected once at startup.
//!
//! The shell decides what it is (desktop terminal with a local database
//! file, or hosted web admin) and injects the result into the adapter;
//! nothing downstream re-derives the environment per call.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Running inside the desktop shell.
    pub desktop_shell: bool,
    /// A local store was opened successfully.
    pub local_store_available: bool,
}

impl Capabilities {
    /// Desktop terminal with its embedded database.
    pub fn desktop() -> Self {
        Self {
            desktop_shell: true,
            local_store_available: true,
        }
    }

    /// Web admin: remote-only, no offline path.
    pub fn web_admin() -> Self {
        Self {
            desktop_shell: false,
            local_store_available: false,
        }
    }
}
