fn main() {
    if let Err(err) = wallbox_reporter::app::run_service() {
        eprintln!("service startup failed: {err}");
        std::process::exit(1);
    }
}
