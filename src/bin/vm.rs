//! Short binary name (`vm`) that forwards to the `vaata_mind` library.
//! Keeping the alias as a real binary avoids shell alias requirements.

fn main() {
    if let Err(err) = vaata_mind::entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
