fn main() {
    if let Err(err) = sidekick_lib::run() {
        log::error!("sidekick exited with error: {err:?}");
        eprintln!("sidekick: {err:#}");
        std::process::exit(1);
    }
}
