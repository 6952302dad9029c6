use crate::commands::prompts;
use crate::output::{Output, OutputFormat};
use color_eyre::Result;
use comfy_table::{Cell, Table};
use serde_json::json;
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessesToUpdate, Signal, System};
use tracing::{debug, info, warn};

/// Command-line fragments of browsers started for automation
const AUTOMATION_MARKERS: [&str; 5] = [
    "--headless",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--remote-debugging-port",
    "chromedriver",
];

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessKind {
    /// Chrome/Chromium with automation flags
    Headless,
    Driver,
    /// Someone's regular browser; never touched
    Interactive,
}

impl ProcessKind {
    fn label(self) -> &'static str {
        match self {
            ProcessKind::Headless => "headless browser",
            ProcessKind::Driver => "chromedriver",
            ProcessKind::Interactive => "browser",
        }
    }
}

#[derive(Debug, Clone)]
struct BrowserProcess {
    pid: Pid,
    name: String,
    memory_bytes: u64,
    kind: ProcessKind,
}

#[derive(Debug, Clone, Copy)]
struct MemoryReport {
    total: u64,
    used: u64,
    available: u64,
}

impl MemoryReport {
    fn from_system(sys: &System) -> Self {
        Self {
            total: sys.total_memory(),
            used: sys.used_memory(),
            available: sys.available_memory(),
        }
    }

    fn percent_used(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }

    fn summary(&self) -> String {
        format!(
            "Memory: {:.1} GB used of {:.1} GB ({:.1}%), {:.1} GB available - {}",
            self.used as f64 / GIB,
            self.total as f64 / GIB,
            self.percent_used(),
            self.available as f64 / GIB,
            pressure_band(self.percent_used())
        )
    }
}

fn pressure_band(percent_used: f64) -> &'static str {
    if percent_used > 85.0 {
        "high"
    } else if percent_used > 70.0 {
        "moderate"
    } else {
        "normal"
    }
}

fn classify(name: &str, cmdline: &str) -> Option<ProcessKind> {
    let name = name.to_lowercase();
    let cmdline = cmdline.to_lowercase();
    if name.contains("chromedriver") {
        return Some(ProcessKind::Driver);
    }
    if !name.contains("chrome") && !name.contains("chromium") {
        return None;
    }
    if AUTOMATION_MARKERS.iter().any(|marker| cmdline.contains(marker)) {
        Some(ProcessKind::Headless)
    } else {
        Some(ProcessKind::Interactive)
    }
}

fn scan(sys: &System) -> Vec<BrowserProcess> {
    let mut found: Vec<BrowserProcess> = sys
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
            let name = process.name().to_string_lossy().to_string();
            let cmdline = process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(" ");
            classify(&name, &cmdline).map(|kind| BrowserProcess {
                pid: *pid,
                name,
                memory_bytes: process.memory(),
                kind,
            })
        })
        .collect();
    found.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));
    found
}

/// SIGTERM first so the browser can shut down its children; SIGKILL when
/// the platform has no TERM or the signal could not be delivered.
fn terminate(process: &Process) -> bool {
    match process.kill_with(Signal::Term) {
        Some(true) => true,
        _ => process.kill(),
    }
}

pub async fn run_cleanup(output: &Output) -> Result<()> {
    tokio::select! {
        result = cleanup(output) => result,
        _ = tokio::signal::ctrl_c() => {
            output.error("Interrupted");
            std::process::exit(1);
        }
    }
}

async fn cleanup(output: &Output) -> Result<()> {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let before = MemoryReport::from_system(&sys);
    output.info(before.summary());

    let (targets, others): (Vec<_>, Vec<_>) = scan(&sys)
        .into_iter()
        .partition(|p| p.kind != ProcessKind::Interactive);
    if !others.is_empty() {
        debug!("Leaving {} regular browser processes alone", others.len());
    }

    if targets.is_empty() {
        output.success("No headless browser processes found");
        return Ok(());
    }

    let target_memory: u64 = targets.iter().map(|p| p.memory_bytes).sum();
    let mut table = Table::new();
    table.set_header(vec!["PID", "Process", "Memory (MB)", "Kind"]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    for process in &targets {
        table.add_row(vec![
            Cell::new(process.pid),
            Cell::new(&process.name),
            Cell::new(format!("{:.1}", process.memory_bytes as f64 / MIB)),
            Cell::new(process.kind.label()),
        ]);
    }
    output.table(&table);
    output.info(format!(
        "Found {} automation browser processes using {:.1} MB",
        targets.len(),
        target_memory as f64 / MIB
    ));

    let confirmed = prompts::confirm("Terminate these processes?", false, output)?;
    if !confirmed {
        output.info("Cancelled; nothing terminated");
        return Ok(());
    }

    let mut killed = 0;
    let mut failed = 0;
    for target in &targets {
        match sys.process(target.pid) {
            Some(process) if terminate(process) => {
                info!(pid = %target.pid, "Terminated {}", target.name);
                killed += 1;
            }
            Some(_) => {
                warn!(pid = %target.pid, "Could not terminate {}", target.name);
                failed += 1;
            }
            // Exited on its own, e.g. a renderer whose parent was just killed
            None => debug!(pid = %target.pid, "{} already gone", target.name),
        }
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    sys.refresh_memory();
    let after = MemoryReport::from_system(&sys);
    let freed = before.used.saturating_sub(after.used);

    match output.format() {
        OutputFormat::Human => {
            if failed > 0 {
                output.warn(format!("Terminated {} processes, {} could not be terminated", killed, failed));
            } else {
                output.success(format!("Terminated {} processes", killed));
            }
            output.info(after.summary());
            output.info(format!("Freed about {:.1} MB", freed as f64 / MIB));
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&json!({
                "success": failed == 0,
                "terminated": killed,
                "failed": failed,
                "memory_before_percent": before.percent_used(),
                "memory_after_percent": after.percent_used(),
                "freed_bytes": freed,
            }));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_headless_browser() {
        assert_eq!(
            classify("chrome", "/opt/chrome --headless --remote-debugging-port=9222"),
            Some(ProcessKind::Headless)
        );
        assert_eq!(
            classify("Chromium", "chromium --no-sandbox --disable-gpu"),
            Some(ProcessKind::Headless)
        );
    }

    #[test]
    fn test_classify_leaves_regular_browsers() {
        assert_eq!(
            classify("Google Chrome", "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            Some(ProcessKind::Interactive)
        );
        assert_eq!(classify("firefox", "firefox --headless"), None);
    }

    #[test]
    fn test_classify_ignores_flag_case() {
        assert_eq!(classify("chrome", "CHROME --HEADLESS"), Some(ProcessKind::Headless));
        assert_eq!(
            classify("chrome.exe", "C:\\Chrome\\chrome.exe --Remote-Debugging-Port=9222"),
            Some(ProcessKind::Headless)
        );
        assert_eq!(classify("CHROMEDRIVER.EXE", ""), Some(ProcessKind::Driver));
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_sends_sigterm() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = Pid::from_u32(child.id());
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        assert!(terminate(sys.process(pid).unwrap()));
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(15));
    }

    #[test]
    fn test_classify_driver() {
        assert_eq!(classify("chromedriver", "chromedriver --port=9515"), Some(ProcessKind::Driver));
    }

    #[test]
    fn test_pressure_bands() {
        assert_eq!(pressure_band(90.0), "high");
        assert_eq!(pressure_band(85.0), "moderate");
        assert_eq!(pressure_band(75.5), "moderate");
        assert_eq!(pressure_band(70.0), "normal");
    }

    #[test]
    fn test_memory_report_percent() {
        let report = MemoryReport {
            total: 8 * 1024,
            used: 2 * 1024,
            available: 6 * 1024,
        };
        assert_eq!(report.percent_used(), 25.0);
        assert!(report.summary().ends_with("normal"));
        let empty = MemoryReport {
            total: 0,
            used: 0,
            available: 0,
        };
        assert_eq!(empty.percent_used(), 0.0);
    }
}
