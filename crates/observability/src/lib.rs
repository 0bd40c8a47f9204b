//! Process-wide logging setup shared by the catechesis binaries.

/// Install the JSON `tracing` subscriber.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
