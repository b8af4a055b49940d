//! Compile-time defaults for `LayerConfig`

/// TCP region size
pub const TCP_SLOTS: usize = 8;

/// UDP region size
pub const UDP_SLOTS: usize = 4;

/// Receive ring capacity per socket, bytes
pub const RECV_CAPACITY: usize = 2048;

/// Send buffer capacity per socket, bytes (one Ethernet MSS)
pub const SEND_CAPACITY: usize = 1460;

/// Completion queue depth
pub const COMPLETION_QUEUE: usize = 256;

/// Upper bound on a single park, microseconds
pub const PARK_INTERVAL_US: u64 = 1000;

/// Park intervals `close()` waits for cancel completions
pub const CLOSE_GRACE: u32 = 50;

/// Ephemeral port draws before giving up
pub const PORT_ATTEMPTS: u32 = 16;

pub const DEBUG_LOGGING: bool = false;
