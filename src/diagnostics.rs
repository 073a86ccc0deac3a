//! Startup diagnostics about the host system.
//!
//! The application logs a few lines about the machine it runs on when it starts. The facts are
//! gathered by a [`SystemProbe`]. The [`HostProbe`] is a best effort one, reading what the
//! operating system readily offers and leaving the rest empty. Applications that know more (eg.
//! about their GPUs) can plug their own probe in with
//! [`Application::with_probe`][crate::Application::with_probe].

use std::collections::HashMap;
use std::env;
use std::fs;

use chrono::NaiveDate;
use log::{debug, info, warn};
use plywood_log::ansi;

use crate::paths::AppPaths;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Free memory ratio under which the application warns.
pub const MEMORY_WARNING: f64 = 0.01;
/// Free memory ratio under which the memory figure is highlighted.
pub const MEMORY_CAUTION: f64 = 0.1;
/// Free disk ratio under which the application warns.
pub const DISK_WARNING: f64 = 0.1;

/// Available and total amount of some resource, in bytes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Capacity {
    pub available: u64,
    pub total: u64,
}

impl Capacity {
    /// The available part of the total.
    ///
    /// An unknown (zero) total counts as all free.
    pub fn free_ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.available as f64 / self.total as f64
        }
    }

    /// Renders as `<available> GiB / <total> GiB`, rounded to whole gibibytes.
    pub fn render(&self) -> String {
        format!(
            "{:3.0} GiB / {:3.0} GiB",
            self.available as f64 / GIB,
            self.total as f64 / GIB
        )
    }
}

/// Facts about the host and the application.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemInfo {
    pub cpu: String,
    pub gpus: Vec<String>,
    pub memory: Capacity,
    pub disk: Capacity,
    /// The toolkit and its version.
    pub runtime: String,
    pub script: String,
    pub version: String,
    pub hostname: String,
    /// Name of the operating system, like `Linux`, `Darwin` or `Windows`.
    pub platform: String,
}

impl SystemInfo {
    pub fn memory_warning(&self) -> bool {
        self.memory.free_ratio() < MEMORY_WARNING
    }

    pub fn disk_warning(&self) -> bool {
        self.disk.free_ratio() < DISK_WARNING
    }

    /// The memory figures, colored red when low and yellow when getting low.
    pub fn memory_summary(&self) -> String {
        let text = self.memory.render();
        if self.memory_warning() {
            ansi::red(&text)
        } else if self.memory.free_ratio() < MEMORY_CAUTION {
            ansi::yellow(&text)
        } else {
            text
        }
    }

    /// The disk figures, colored red when low.
    pub fn disk_summary(&self) -> String {
        let text = self.disk.render();
        if self.disk_warning() {
            ansi::red(&text)
        } else {
            text
        }
    }

    pub fn gpu_summary(&self) -> String {
        self.gpus.join(";")
    }
}

/// The content of an `os-release` file.
///
/// See `os-release(5)`. Only simple `KEY=value` lines are understood, values optionally quoted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for quote in &['"', '\''] {
        if value.len() >= 2 && value.starts_with(*quote) && value.ends_with(*quote) {
            let inner = &value[1..value.len() - 1];
            if *quote == '\'' {
                return inner.to_owned();
            }
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                match (c, chars.clone().next()) {
                    ('\\', Some(next)) if "\"\\$`".contains(next) => {
                        out.push(next);
                        chars.next();
                    }
                    _ => out.push(c),
                }
            }
            return out;
        }
    }
    value.to_owned()
}

/// Whether the distribution release is still supported.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Support {
    /// Supported until the date.
    Until(NaiveDate),
    /// Support ended on the date.
    Ended(NaiveDate),
    /// The release doesn't say.
    Unknown,
    /// The end date is there, but isn't a `YYYY-MM-DD` date.
    Unparsable(String),
}

impl OsRelease {
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let pos = line.find('=')?;
                Some((line[..pos].trim().to_owned(), unquote(&line[pos + 1..])))
            })
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// The distribution name, `Linux` if not present.
    pub fn name(&self) -> &str {
        self.get("NAME").unwrap_or("Linux")
    }

    pub fn version_id(&self) -> Option<&str> {
        self.get("VERSION_ID")
    }

    pub fn codename(&self) -> Option<&str> {
        self.get("VERSION_CODENAME")
    }

    /// `Running on <name> <version> <codename>`, skipping the parts that are missing.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.name()];
        parts.extend(self.version_id());
        parts.extend(self.codename());
        parts.retain(|part| !part.is_empty());
        format!("Running on {}", parts.join(" "))
    }

    /// Checks the `SUPPORT_END` date against today.
    ///
    /// Support ends at the start of the given day.
    pub fn support(&self, today: NaiveDate) -> Support {
        match self.get("SUPPORT_END") {
            None => Support::Unknown,
            Some(end) => match NaiveDate::parse_from_str(end, "%Y-%m-%d") {
                Ok(end) if end <= today => Support::Ended(end),
                Ok(end) => Support::Until(end),
                Err(_) => Support::Unparsable(end.to_owned()),
            },
        }
    }
}

/// Source of the facts about the host.
pub trait SystemProbe {
    /// Gathers the facts. Whatever can't be found out is left empty.
    fn system_info(&self, paths: &AppPaths) -> SystemInfo;

    /// The distribution release information, on systems that have it.
    fn os_release(&self) -> Option<OsRelease>;
}

/// Best effort probe of the machine the process runs on.
#[derive(Copy, Clone, Debug, Default)]
pub struct HostProbe;

fn read_trimmed(path: &str) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn parse_cpuinfo(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| {
            let pos = line.find(':')?;
            Some((line[..pos].trim(), line[pos + 1..].trim()))
        })
        .find(|(key, _)| *key == "model name" || *key == "Model" || *key == "Hardware")
        .map(|(_, value)| value.to_owned())
}

fn parse_meminfo(text: &str) -> Capacity {
    let field = |name: &str| {
        text.lines()
            .find(|line| line.starts_with(name) && line[name.len()..].starts_with(':'))
            .and_then(|line| line[name.len() + 1..].split_whitespace().next())
            .and_then(|kib| kib.parse::<u64>().ok())
            .map(|kib| kib * 1024)
    };
    let total = field("MemTotal").unwrap_or(0);
    let available = field("MemAvailable")
        .or_else(|| field("MemFree"))
        .unwrap_or(0);
    Capacity { available, total }
}

/// The operating system name the way `uname` tells it.
fn platform_name() -> String {
    match env::consts::OS {
        "linux" | "android" => "Linux".to_owned(),
        "macos" | "ios" => "Darwin".to_owned(),
        "windows" => "Windows".to_owned(),
        "freebsd" => "FreeBSD".to_owned(),
        "netbsd" => "NetBSD".to_owned(),
        "openbsd" => "OpenBSD".to_owned(),
        other => other.to_owned(),
    }
}

#[cfg(unix)]
fn disk_capacity() -> Capacity {
    match nix::sys::statvfs::statvfs("/") {
        Ok(stat) => {
            let fragment = stat.fragment_size() as u64;
            Capacity {
                available: stat.blocks_available() as u64 * fragment,
                total: stat.blocks() as u64 * fragment,
            }
        }
        Err(e) => {
            debug!("Couldn't read the disk usage: {}", e);
            Capacity::default()
        }
    }
}

#[cfg(not(unix))]
fn disk_capacity() -> Capacity {
    Capacity::default()
}

impl SystemProbe for HostProbe {
    fn system_info(&self, paths: &AppPaths) -> SystemInfo {
        let cpu = fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|text| parse_cpuinfo(&text))
            .unwrap_or_else(|| env::consts::ARCH.to_owned());
        let memory = fs::read_to_string("/proc/meminfo")
            .map(|text| parse_meminfo(&text))
            .unwrap_or_default();
        let hostname = read_trimmed("/proc/sys/kernel/hostname")
            .or_else(|| read_trimmed("/etc/hostname"))
            .or_else(|| env::var("HOSTNAME").ok())
            .or_else(|| env::var("COMPUTERNAME").ok())
            .unwrap_or_else(|| "unknown".to_owned());
        SystemInfo {
            cpu,
            gpus: Vec::new(),
            memory,
            disk: disk_capacity(),
            runtime: format!("plywood {}", env!("CARGO_PKG_VERSION")),
            script: paths.app_name().to_owned(),
            version: paths.app_version().to_owned(),
            hostname,
            platform: platform_name(),
        }
    }

    fn os_release(&self) -> Option<OsRelease> {
        fs::read_to_string("/etc/os-release")
            .or_else(|_| fs::read_to_string("/usr/lib/os-release"))
            .ok()
            .map(|text| OsRelease::parse(&text))
    }
}

fn debug_line(pairs: &[(&str, &str)]) {
    let line = pairs
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join(", ");
    debug!("{}", line);
}

/// Logs the hardware, GPU and system lines.
pub fn log_system_info(info: &SystemInfo) {
    debug_line(&[
        ("cpu", info.cpu.as_str()),
        ("memory", info.memory_summary().as_str()),
        ("disk", info.disk_summary().as_str()),
    ]);
    debug_line(&[("gpu", info.gpu_summary().as_str())]);
    debug_line(&[
        ("runtime", info.runtime.as_str()),
        ("script", info.script.as_str()),
        ("version", info.version.as_str()),
        ("hostname", info.hostname.as_str()),
        ("platform", info.platform.as_str()),
    ]);
}

/// Logs the distribution and whether it is still supported.
pub fn log_distro(release: &OsRelease, today: NaiveDate) {
    let description = release.describe();
    match release.support(today) {
        Support::Ended(end) => {
            debug!("{} (END OF SUPPORT {})", description, end);
            warn!(
                "Thank you for using Linux! Please upgrade to a newer {} release as soon as possible! Stay safe!",
                release.name()
            );
        }
        Support::Unparsable(end) => {
            debug!("{}", description);
            warn!("Can't tell when the support of {} ends: {:?}", release.name(), end);
        }
        Support::Until(_) | Support::Unknown => {
            debug!("{}", description);
            info!("Thank you for using Linux!");
        }
    }
}

/// Warns about scarce memory or disk space.
pub fn log_warnings(info: &SystemInfo) {
    if info.memory_warning() {
        warn!(
            "Please close some unneeded applications or upgrade your memory! {}",
            ansi::red(&format!("Free memory left: {}", info.memory.render()))
        );
    }
    if info.disk_warning() {
        warn!(
            "Please free up some disk space, it is getting quite full! {}",
            ansi::red(&format!("Free disk space left: {}", info.disk.render()))
        );
    }
}
