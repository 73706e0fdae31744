//! Atomic execution-mode storage with per-cycle snapshotting (spec §4.C,
//! §5 "Ordering guarantees": a concurrent `set_mode` must not affect an
//! in-flight routing cycle).

use std::sync::atomic::{AtomicU8, Ordering};

use pulsus_common::capability::ExecutionMode;

#[derive(Debug)]
pub struct ModeStore(AtomicU8);

impl Default for ModeStore {
    fn default() -> Self {
        Self(AtomicU8::new(encode(ExecutionMode::Execute)))
    }
}

impl ModeStore {
    pub fn set(&self, mode: ExecutionMode) {
        self.0.store(encode(mode), Ordering::SeqCst);
    }

    pub fn get(&self) -> ExecutionMode {
        decode(self.0.load(Ordering::SeqCst))
    }

    /// Capture the mode once; the router holds this value for the
    /// entire routing cycle regardless of concurrent `set_mode` calls.
    pub fn snapshot(&self) -> ModeSnapshot {
        ModeSnapshot(self.get())
    }
}

fn encode(mode: ExecutionMode) -> u8 {
    match mode {
        ExecutionMode::Plan => 0,
        ExecutionMode::Execute => 1,
        ExecutionMode::Unsafe => 2,
    }
}

fn decode(byte: u8) -> ExecutionMode {
    match byte {
        0 => ExecutionMode::Plan,
        2 => ExecutionMode::Unsafe,
        _ => ExecutionMode::Execute,
    }
}

/// An immutable, per-cycle view of the execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSnapshot(ExecutionMode);

impl ModeSnapshot {
    pub fn mode(self) -> ExecutionMode {
        self.0
    }
}
