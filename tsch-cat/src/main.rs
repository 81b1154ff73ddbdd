use std::process::ExitCode;

use clap::Parser;
use tsch_cat::FrameParser;

/// `cat` for IEEE 802.15.4e TSCH frames.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The frame to describe, in hex and without FCS.
    #[clap(value_parser(clap::builder::NonEmptyStringValueParser::new()))]
    input: String,

    /// The frame ends with its FCS, which is checked and stripped.
    #[arg(long)]
    fcs: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let output = if args.fcs {
        FrameParser::parse_hex_with_fcs(&args.input)
    } else {
        FrameParser::parse_hex(&args.input)
    };

    match output {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
