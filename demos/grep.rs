use std::{
    fs::File,
    io::{BufRead, BufReader},
};

use anyhow::Result;
use clap::Parser;
use lexcalc::Regex;

#[derive(Parser)]
struct Cli {
    pattern: String,
    file: String,
    /// Print only the matched part of each line.
    #[arg(short, long)]
    only_matching: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let file = File::open(args.file)?;
    let reader = BufReader::new(file);
    let re = Regex::new(&args.pattern)?;

    for line in reader.lines() {
        let line = line?;
        let Some((start, end)) = re.find(&line) else {
            continue;
        };
        if args.only_matching {
            println!("{}", &line[start..end]);
        } else {
            println!("{line}");
        }
    }

    Ok(())
}
