//! No public API: this crate only exists to host `tests/scenarios.rs`,
//! which wires the gate, bus, episodic store, and audit log together the
//! way no single one of those crates can exercise on its own.
