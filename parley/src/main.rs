//! parley binary.

fn main() {
    if let Err(e) = parley::run_cli() {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}
