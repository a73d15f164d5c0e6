fn main() {
    if let Err(e) = jarvis_client::cli::main() {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
