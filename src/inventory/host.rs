//! Host memory probe

use sysinfo::System;

/// Total physical host memory in bytes
pub fn host_memory_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_memory_is_reported() {
        assert!(host_memory_bytes() > 0);
    }
}
