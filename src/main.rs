fn main() {
    if let Err(err) = orthogram::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
