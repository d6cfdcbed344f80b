use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use lexcalc::{DataLayout, DataMap, Datum, ExprCompiler, Record};

/// Evaluate an expression over `name=value` fields.
#[derive(Parser)]
struct Cli {
    expression: String,
    /// Field assignments such as `x=3` or `name=abc`.
    fields: Vec<String>,
    /// Compile-time values for `$0`, `$1`, ...
    #[arg(short, long = "extra")]
    extras: Vec<f64>,
    /// Seed for RAND(); without it RAND is not available.
    #[arg(long)]
    seed: Option<u64>,
    /// Only list the fields the expression refers to.
    #[arg(long)]
    fields_only: bool,
}

fn parse_field(field: &str) -> Result<(&str, Datum)> {
    let (name, value) = field
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=value, got {:?}", field))?;
    let value = match value.parse::<f64>() {
        Ok(v) => Datum::from(v),
        Err(_) => Datum::from(value),
    };
    Ok((name, value))
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let mut compiler = ExprCompiler::new();
    if let Some(seed) = args.seed {
        use rand::SeedableRng;
        compiler = compiler.with_random(rand::rngs::StdRng::seed_from_u64(seed));
    }

    if args.fields_only {
        for name in compiler.fields_referenced(&args.expression)? {
            println!("{name}");
        }
        return Ok(());
    }

    let fields = args
        .fields
        .iter()
        .map(|f| parse_field(f))
        .collect::<Result<Vec<_>>>()?;
    let layout: DataLayout = fields.iter().map(|(name, _)| *name).collect();
    let mut record = DataMap::new(Arc::new(layout));
    for (name, value) in fields {
        record.set(name, value);
    }

    let extras: Vec<Datum> = args.extras.into_iter().map(Datum::from).collect();
    let expr = compiler.compile(record.schema(), &args.expression, &extras)?;
    println!("{}", expr.eval(&record));

    Ok(())
}
