// Demo: Logistic Regression on study hours
//
// Reads Hours,Pass from a CSV file and fits the chance of passing an exam
// from the hours studied.
//
//   cargo run -p study_hours -- [path/to/file.csv] [key=value ...]
//
// Options are the FitOptions keys, e.g. solver=adam learning_rate=0.05.

use regrad::data::{read_columns, ColumnSpec};
use regrad::prelude::*;

const DEFAULT_CSV: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/study.csv");

fn main() -> regrad::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1).peekable();
    let path = if args.peek().is_some_and(|a| !a.contains('=')) {
        args.next().unwrap_or_default()
    } else {
        DEFAULT_CSV.to_string()
    };
    let pairs: Vec<(String, String)> = args
        .map(|a| match a.split_once('=') {
            Some((k, v)) => Ok((k.to_string(), v.to_string())),
            None => Err(regrad::Error::config(format!(
                "expected key=value, got '{a}'"
            ))),
        })
        .collect::<regrad::Result<_>>()?;
    let options = FitOptions::from_pairs(pairs)?.with_record_every(2_000);

    let cols = read_columns(&path, &ColumnSpec::new("Pass").feature("Hours"))?;
    log::info!("loaded {} rows from {path}", cols.len());

    let report = fit(
        ModelKind::Logistic,
        &cols.feature_slices(),
        &cols.target,
        &options,
    )?;
    println!("{}\n", report.training);

    println!(" hours | passed | P(pass)");
    let hours = &cols.features[0];
    for (h, p) in hours.iter().zip(cols.target.iter()) {
        let prob = report.model.predict(&[*h])?;
        println!(" {h:>5.2} | {p:>6} | {prob:.3}");
    }

    Ok(())
}
