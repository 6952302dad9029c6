use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info};

const MIB: f64 = 1024.0 * 1024.0;

/// Log this process's resident memory and overall system usage.
pub fn log_memory_usage(stage: &str) {
    let mut sys = System::new();
    sys.refresh_memory();

    let process_mb = match sysinfo::get_current_pid() {
        Ok(pid) => {
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            sys.process(pid).map(|p| p.memory() as f64 / MIB)
        }
        Err(e) => {
            debug!("Cannot resolve own pid: {}", e);
            None
        }
    };

    let total = sys.total_memory();
    let system_percent = if total > 0 {
        sys.used_memory() as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    match process_mb {
        Some(mb) => info!(stage, "Memory: {:.1} MB resident, system {:.1}% used", mb, system_percent),
        None => info!(stage, "Memory: system {:.1}% used", system_percent),
    }
}
