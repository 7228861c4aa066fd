use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot admission gate. At most one [`GatePermit`] exists at a time;
/// callers that find the slot taken are turned away rather than queued.
#[derive(Debug, Default)]
pub struct AdmissionGate {
    busy: AtomicBool,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GatePermit { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the gate's slot; dropping it frees the slot on every exit path.
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
