//! Build script for mbus-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates timing.toml and turns it into the factory `TimingConfig`

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    generate_timing();
}

/// Set up linker search paths and scripts
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Nominal timings as written in timing.toml
struct Nominal {
    zero: u16,
    one: u16,
    bit: u16,
    tolerance: u16,
    min_pause: u16,
    space: u16,
}

/// Validate timing.toml and emit `timing_defaults.rs` into OUT_DIR
fn generate_timing() {
    println!("cargo:rerun-if-changed=timing.toml");

    let config_path = Path::new("timing.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: timing.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware needs factory bus timings in timing.toml.          ║\n\
            ║  Please create one in the mbus-firmware directory.               ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read timing.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Table = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in timing.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let nominal = read_nominal(&config);
    validate_nominal(&nominal);
    write_timing(&nominal);

    println!("cargo:warning=timing.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report(title: &str, errors: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Pull the six tick values out of their sections
fn read_nominal(config: &toml::Table) -> Nominal {
    let mut errors = Vec::new();

    let mut get = |section: &str, key: &str| -> u16 {
        let value = config
            .get(section)
            .and_then(|s| s.as_table())
            .and_then(|t| t.get(key));

        match value {
            Some(toml::Value::Integer(v)) if (1..=i64::from(u16::MAX)).contains(v) => *v as u16,
            Some(toml::Value::Integer(_)) => {
                errors.push(format!("[{}] {} must be 1-65535 ticks", section, key));
                0
            }
            Some(_) => {
                errors.push(format!("[{}] {} must be an integer", section, key));
                0
            }
            None => {
                errors.push(format!("[{}] missing '{}'", section, key));
                0
            }
        }
    };

    let nominal = Nominal {
        zero: get("pulse", "zero"),
        one: get("pulse", "one"),
        bit: get("pulse", "bit"),
        tolerance: get("pulse", "tolerance"),
        min_pause: get("frame", "min_pause"),
        space: get("frame", "space"),
    };

    if !errors.is_empty() {
        report("Missing or invalid values in timing.toml", &errors);
    }
    nominal
}

/// The receive windows must not overlap and every pulse must fit its cell
fn validate_nominal(n: &Nominal) {
    let mut errors = Vec::new();

    if n.tolerance >= n.zero {
        errors.push("tolerance must be smaller than the zero pulse".to_string());
    }
    if i32::from(n.zero) + i32::from(n.tolerance) >= i32::from(n.one) - i32::from(n.tolerance) {
        errors.push("zero and one windows overlap; widen the gap or cut tolerance".to_string());
    }
    if n.one >= n.bit {
        errors.push("one pulse must be shorter than the bit cell".to_string());
    }
    if u32::from(n.one) + u32::from(n.tolerance) > u32::from(u16::MAX) {
        errors.push("one pulse plus tolerance exceeds the tick range".to_string());
    }
    if u32::from(n.bit) + u32::from(n.min_pause) > u32::from(u16::MAX) {
        errors.push("bit cell plus pause exceeds the tick range".to_string());
    }

    if !errors.is_empty() {
        report("Invalid bus timing in timing.toml", &errors);
    }
}

/// Emit the factory `TimingConfig` constant
fn write_timing(n: &Nominal) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut f = File::create(out_dir.join("timing_defaults.rs")).unwrap();

    writeln!(
        f,
        "/// Factory bus timings generated from timing.toml\n\
         pub const FACTORY_TIMING: TimingConfig = TimingConfig {{\n    \
             min_zero: {},\n    \
             max_zero: {},\n    \
             min_one: {},\n    \
             max_one: {},\n    \
             bit_timeout: {},\n    \
             send_zero: {},\n    \
             send_one: {},\n    \
             send_bit: {},\n    \
             send_space: {},\n\
         }};",
        n.zero - n.tolerance,
        n.zero + n.tolerance,
        n.one - n.tolerance,
        n.one + n.tolerance,
        n.bit + n.min_pause,
        n.zero,
        n.one,
        n.bit,
        n.space,
    )
    .unwrap();
}
