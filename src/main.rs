use wallbox_reporter::app::{CycleOutcome, DeliveryMode, run_once};
use wallbox_reporter::domain::models::ReportPeriod;

fn main() {
    if let Err(error) = run() {
        eprintln!("report run failed: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut period = None;
    let mut mode = DeliveryMode::Send;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--period" => {
                let Some(value) = args.get(index + 1) else {
                    return Err("--period requires a value".to_string());
                };
                let parsed = value
                    .parse::<ReportPeriod>()
                    .map_err(|error| format!("invalid --period {value:?}: {error}"))?;
                period = Some(parsed);
                index += 2;
            }
            "--no-send" => {
                mode = DeliveryMode::RenderOnly;
                index += 1;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    match run_once(period, mode).map_err(|error| error.to_string())? {
        CycleOutcome::Delivered {
            report_path,
            sessions,
        } => println!(
            "report with {sessions} sessions sent: {}",
            report_path.display()
        ),
        CycleOutcome::Rendered {
            report_path,
            sessions,
        } => println!(
            "report with {sessions} sessions written: {}",
            report_path.display()
        ),
        CycleOutcome::NoData => println!("no charging sessions in period, nothing to report"),
        CycleOutcome::DeliveryFailed { report_path, error } => {
            return Err(format!(
                "report written to {} but delivery failed: {error}",
                report_path.display()
            ));
        }
    }
    Ok(())
}

fn print_help() {
    println!("wallbox_reporter");
    println!();
    println!("Usage:");
    println!("  cargo run --bin wallbox_reporter -- [--period <YYYY-MM>] [--no-send]");
    println!();
    println!("Options:");
    println!("  --period <YYYY-MM>   month to report (default: scheduled target month)");
    println!("  --no-send            write the PDF without sending any message");
}
