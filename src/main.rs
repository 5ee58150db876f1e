fn main() {
    if let Err(e) = swallow_lib::run() {
        eprintln!("swallow failed: {}", e);
        std::process::exit(1);
    }
}
