/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use log::warn;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Source of gauge samples, refreshed on every poll tick.
pub trait Probe: Send {
    fn collect(&mut self, gauges: &mut Vec<(String, f64)>);
}

/// Host and current process figures read through `sysinfo`.
pub struct SysinfoProbe {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("process metrics disabled: {e}");
                None
            }
        };
        let mut system = System::new();
        // cpu usage is computed between two refreshes
        system.refresh_cpu_usage();
        SysinfoProbe { system, pid }
    }

    fn collect_process(&mut self, pid: Pid, gauges: &mut Vec<(String, f64)>) {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let Some(process) = self.system.process(pid) else {
            return;
        };
        let disk = process.disk_usage();
        gauges.extend([
            ("ProcessResidentMemory".to_string(), process.memory() as f64),
            ("ProcessVirtualMemory".to_string(), process.virtual_memory() as f64),
            ("ProcessCpuUsage".to_string(), f64::from(process.cpu_usage())),
            ("ProcessRunTime".to_string(), process.run_time() as f64),
            ("ProcessDiskReadBytes".to_string(), disk.total_read_bytes as f64),
            ("ProcessDiskWrittenBytes".to_string(), disk.total_written_bytes as f64),
        ]);
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        SysinfoProbe::new()
    }
}

impl Probe for SysinfoProbe {
    fn collect(&mut self, gauges: &mut Vec<(String, f64)>) {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        gauges.extend([
            ("TotalMemory".to_string(), self.system.total_memory() as f64),
            ("FreeMemory".to_string(), self.system.free_memory() as f64),
            ("AvailableMemory".to_string(), self.system.available_memory() as f64),
            ("UsedMemory".to_string(), self.system.used_memory() as f64),
            ("TotalSwap".to_string(), self.system.total_swap() as f64),
            ("FreeSwap".to_string(), self.system.free_swap() as f64),
        ]);
        for (i, cpu) in self.system.cpus().iter().enumerate() {
            gauges.push((
                format!("CPUutilization{}", i + 1),
                f64::from(cpu.cpu_usage()),
            ));
        }

        let load = System::load_average();
        gauges.extend([
            ("LoadAverage1".to_string(), load.one),
            ("LoadAverage5".to_string(), load.five),
            ("LoadAverage15".to_string(), load.fifteen),
        ]);

        if let Some(pid) = self.pid {
            self.collect_process(pid, gauges);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysinfo_samples() {
        let mut probe = SysinfoProbe::new();
        let mut gauges = Vec::new();
        probe.collect(&mut gauges);

        let get = |name: &str| gauges.iter().find(|(n, _)| n == name).map(|(_, v)| *v);
        assert!(get("TotalMemory").unwrap() > 0.0);
        assert!(get("FreeMemory").is_some());
        assert!(get("CPUutilization1").is_some());
    }
}
