use std::collections::HashMap;
use std::env;
use std::fmt::Write;
use std::path::PathBuf;

fn main() {
    // (Variable, Type, Default value)
    let mut configs: HashMap<&str, (&str, &str)> = HashMap::from([
        ("MAX_SLOTFRAMES", ("usize", "4")),
        ("MAX_LINKS", ("usize", "32")),
        ("MAX_NEIGHBORS", ("usize", "16")),
        ("QUEUE_PER_NEIGHBOR", ("usize", "8")),
        ("MAX_INCOMING_PACKETS", ("usize", "4")),
        ("MAX_DEQUEUED_PACKETS", ("usize", "16")),
        ("MAX_JOIN_PRIORITY", ("u8", "32")),
        ("SCHEDULE_DEFAULT_LENGTH", ("u16", "7")),
        ("HOPPING_SEQUENCE_MAX_LEN", ("usize", "16")),
        ("KEEPALIVE_TIMEOUT", ("Duration", "Duration::from_secs(12)")),
        ("MAX_KEEPALIVE_TIMEOUT", ("Duration", "Duration::from_secs(60)")),
        ("EB_PERIOD", ("Duration", "Duration::from_secs(16)")),
        ("MAX_EB_PERIOD", ("Duration", "Duration::from_secs(16)")),
        ("CHANNEL_SCAN_DURATION", ("Duration", "Duration::from_secs(1)")),
        ("ASSOCIATION_POLL_PERIOD", ("Duration", "Duration::from_ms(10)")),
        ("MAX_FRAME_RETRIES", ("u8", "7")),
        (
            "DUPLICATE_MAX_AGE",
            ("Option<Duration>", "Some(Duration::from_secs(20))"),
        ),
        ("DUPLICATE_SENDERS", ("usize", "64")),
        ("DUPLICATE_HISTORY", ("usize", "16")),
        ("PAN_ID", ("u16", "0xabcd")),
        ("CHECK_PAN_ID", ("bool", "false")),
        ("INIT_SCHEDULE_FROM_EB", ("bool", "true")),
        ("AUTOSELECT_TIME_SOURCE", ("bool", "false")),
        ("SECURITY_SUPPORTED", ("bool", "false")),
        ("SLOT_LENGTH_ADAPTATION", ("bool", "false")),
        (
            "SLOT_LENGTH_RAPID_EB_PERIOD",
            ("Duration", "Duration::from_secs(1)"),
        ),
    ]);

    // Make sure we get rerun if needed
    println!("cargo:rerun-if-changed=build.rs");
    for name in configs.keys() {
        println!("cargo:rerun-if-env-changed=TSCH_{name}");
    }

    // Collect environment variables
    let mut data = String::new();
    // Write preamble
    writeln!(data, "use tsch_frame::time::Duration;").unwrap();

    for (var, value) in std::env::vars() {
        if let Some(name) = var.strip_prefix("TSCH_") {
            // discard from hashmap as a way of consuming the setting
            let Some((_, (ty, _))) = configs.remove_entry(name) else {
                panic!("Wrong configuration name {name}");
            };

            // write to file
            writeln!(data, "pub const {name}: {ty} = {value};").unwrap();
        }
    }

    // Take the remaining configs and write the default value to the file
    for (name, (ty, value)) in configs.iter() {
        writeln!(data, "pub const {name}: {ty} = {value};").unwrap();
    }

    // Now that we have the code of the configuration, actually write it to a file
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    let out_file = out_dir.join("config.rs");
    std::fs::write(out_file, data).unwrap();
}
