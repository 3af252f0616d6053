//! Host-wide memory readings

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::traits::AdapterError;

/// Memory in use on the host, in KB (total minus free)
pub async fn host_memory_usage_kb() -> Result<i64, AdapterError> {
    let sys = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
    );
    used_kb(sys.total_memory(), sys.free_memory()).ok_or_else(|| {
        AdapterError::UnexpectedOutput(format!(
            "host memory unavailable (total {} bytes, free {} bytes)",
            sys.total_memory(),
            sys.free_memory()
        ))
    })
}

fn used_kb(total_bytes: u64, free_bytes: u64) -> Option<i64> {
    if total_bytes == 0 {
        return None;
    }
    i64::try_from(total_bytes.saturating_sub(free_bytes) / 1024).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_kb() {
        assert_eq!(used_kb(16 * 1024 * 1024, 4 * 1024 * 1024), Some(12 * 1024));
        assert_eq!(used_kb(2048, 4096), Some(0));
    }

    #[test]
    fn test_used_kb_without_total() {
        assert_eq!(used_kb(0, 0), None);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_host_memory_usage_is_positive() {
        assert!(host_memory_usage_kb().await.unwrap() > 0);
    }
}
