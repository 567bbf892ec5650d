fn main() {
    if let Err(err) = vaata_mind::entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
