//! Binary entrypoint for fontsleuth (made by FontLab https://www.fontlab.com/)

fn main() {
    if let Err(err) = fontsleuth_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
