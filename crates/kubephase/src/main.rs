fn main() {
    match kubephase_cli::run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {}", kubephase_cli::display_chain(&error));
            std::process::exit(1);
        }
    }
}
