fn main() {
    if let Err(err) = toolchat::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
