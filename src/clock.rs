/// MPF-1B timing constants
pub const DEFAULT_CLOCK_HZ: u32 = 1_790_000; // 1.79 MHz
pub const SLICE_CYCLES: u32 = 18_000;
pub const SLICE_MS: u32 = 10;

/// Counts T-states and splits execution into host-sized slices.
#[derive(Debug, Clone)]
pub struct Clock {
    hz: u32,
    /// Total T-states executed
    total_cycles: u64,
    /// T-states executed in the current slice
    slice_cycles: u32,
    slice_budget: u32,
}

impl Clock {
    pub fn new(hz: u32, slice_budget: u32) -> Self {
        Self {
            hz,
            total_cycles: 0,
            slice_cycles: 0,
            slice_budget,
        }
    }

    pub fn reset(&mut self) {
        self.total_cycles = 0;
        self.slice_cycles = 0;
    }

    /// Advances by `cycles`; returns true once the current slice has used up
    /// its budget.
    pub fn tick(&mut self, cycles: u32) -> bool {
        self.total_cycles += cycles as u64;
        self.slice_cycles += cycles;
        self.slice_expired()
    }

    pub fn slice_expired(&self) -> bool {
        self.slice_cycles > self.slice_budget
    }

    pub fn start_slice(&mut self) {
        self.slice_cycles = 0;
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn hz(&self) -> u32 {
        self.hz
    }

    /// Emulated time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.total_cycles * 1000 / self.hz.max(1) as u64
    }

    /// T-states in `ms` milliseconds at this clock.
    pub fn cycles_for_ms(&self, ms: u32) -> u64 {
        self.hz as u64 * ms as u64 / 1000
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_HZ, SLICE_CYCLES)
    }
}
