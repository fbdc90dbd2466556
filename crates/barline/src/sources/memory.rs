use std::sync::Arc;
use std::time::Duration;

use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

use barline_core::pango::span;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::Config;

const MIB: u64 = 1024 * 1024;

/// Publishes memory pressure: used percent, shared pages, optionally swap.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    let mut tick = super::cadence(Duration::from_secs(3));
    let style = config.mem.style();
    let mut system = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
    );
    loop {
        tick.tick().await;
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            warn!(event = "memory_stats_unavailable");
            continue;
        }
        let used_pct = system.used_memory() * 100 / total;
        let shared_mib = shmem_mib().unwrap_or(0);
        let text = if config.mem.show_swap {
            format!(
                "M:{used_pct}% SHM:{shared_mib}M SW:{}M",
                system.used_swap() / MIB
            )
        } else {
            format!("M:{used_pct}% SHM:{shared_mib}M")
        };
        bar.publish(SourceId::Memory, span(&style, &text));
    }
}

/// sysinfo carries no shared-memory counter, so Shmem comes straight from
/// /proc/meminfo (reported in kB).
fn shmem_mib() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_shmem_kb(&meminfo).map(|kb| kb / 1024)
}

fn parse_shmem_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with("Shmem:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shmem_parses_from_meminfo_format() {
        let meminfo = "MemTotal:       16316620 kB\nMemFree:         1093820 kB\nShmem:            822744 kB\nSwapTotal:             0 kB\n";
        assert_eq!(parse_shmem_kb(meminfo), Some(822_744));
    }

    #[test]
    fn missing_shmem_line_is_none() {
        assert_eq!(parse_shmem_kb("MemTotal: 1 kB\n"), None);
    }
}
