fn main() {
    if let Err(err) = rawbids::run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
