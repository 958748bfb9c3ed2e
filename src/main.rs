fn main() {
    if let Err(err) = docmigrate::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
