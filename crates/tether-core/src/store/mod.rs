// ── Status store ──
//
// The single place consumers read from. Every published value is an
// immutable `Arc` swapped in atomically; readers never take a lock and
// never observe a half-built view.

mod status_store;

pub use status_store::StatusStore;
