//! Check command implementation.
//!
//! Probes every raw telemetry source through the configured shell and
//! reports which ones are readable on this device.

use herakles_hw_telemetry::sampler::{FREE_COMMAND, PROC_STAT_COMMAND, PROC_SWAPS_COMMAND};
use herakles_hw_telemetry::{CommandRunner, Sampler, SourceStatus};
use std::thread;
use std::time::Duration;

use crate::config::{validate_effective_config, Config};

/// Gap between the two CPU samples taken to verify differential parsing.
const CPU_CHECK_GAP: Duration = Duration::from_millis(250);

/// Validates telemetry sources and configuration
pub fn command_check(
    cpu: bool,
    gpu: bool,
    memory: bool,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Hardware Telemetry - Source Check");
    println!("==============================================");

    let runner = config.shell_runner();
    println!(
        "\n🔐 Shell: {} (timeout {}ms)",
        if runner.escalates() {
            format!("{} -c", config.su_binary.as_deref().unwrap_or("su"))
        } else {
            "sh -c".to_string()
        },
        runner.timeout().as_millis()
    );

    // No flag given means check everything
    let everything = all || !(cpu || gpu || memory);
    let mut sampler = Sampler::new(runner);
    let mut all_ok = run_checks(
        &mut sampler,
        cpu || everything,
        gpu || everything,
        memory || everything,
    );

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - device is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}

/// Runs the selected checks; false if a required source is unreadable.
/// A missing GPU source is only a warning since many devices expose none.
pub fn run_checks<R: CommandRunner>(
    sampler: &mut Sampler<R>,
    cpu: bool,
    gpu: bool,
    memory: bool,
) -> bool {
    let statuses = sampler.probe_sources();
    let find = |command: &str| statuses.iter().find(|s| s.command == command);
    let mut all_ok = true;

    if cpu {
        println!("\n🧮 Checking CPU source...");
        all_ok &= report(find(PROC_STAT_COMMAND), true);

        sampler.cpu_usage();
        thread::sleep(CPU_CHECK_GAP);
        let usage = sampler.cpu_usage();
        if sampler.cpu_state().has_baseline() {
            println!("   ✅ CPU usage over {}ms: {}%", CPU_CHECK_GAP.as_millis(), usage);
        } else {
            println!("   ❌ /proc/stat has no parsable aggregate cpu line");
            all_ok = false;
        }
    }

    if gpu {
        println!("\n🎮 Checking GPU sources (probe order)...");
        for status in statuses.iter().filter(|s| s.command.contains("/sys/")) {
            report(Some(status), false);
        }
        let reading = sampler.gpu_reading();
        match reading.source {
            Some(source) => println!("   ✅ GPU usage {}% via {}", reading.percent, source),
            None => println!("   ⚠️  No GPU utilization source available, GPU will report 0"),
        }
    }

    if memory {
        println!("\n💾 Checking memory sources...");
        all_ok &= report(find(FREE_COMMAND), true);
        all_ok &= report(find(PROC_SWAPS_COMMAND), true);

        let snap = sampler.memory_info();
        println!(
            "   📈 RAM {} / {} MB, swap {} / {} MB, zram {} / {} MB",
            snap.ram_used / 1024 / 1024,
            snap.ram_total / 1024 / 1024,
            snap.swap_used / 1024 / 1024,
            snap.swap_total / 1024 / 1024,
            snap.zram_used / 1024 / 1024,
            snap.zram_total / 1024 / 1024
        );
        if snap.ram_total == 0 {
            println!("   ❌ RAM total could not be determined");
            all_ok = false;
        }
    }

    all_ok
}

fn report(status: Option<&SourceStatus>, required: bool) -> bool {
    match status {
        Some(s) if s.available => {
            println!(
                "   ✅ {} -> {}",
                s.command,
                s.sample.as_deref().unwrap_or("")
            );
            true
        }
        Some(s) => {
            let mark = if required { "❌" } else { "➖" };
            println!("   {} {} unavailable", mark, s.command);
            !required
        }
        None => !required,
    }
}
