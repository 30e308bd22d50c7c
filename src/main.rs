fn main() {
    if let Err(err) = amazonia_harmonize::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
