use std::env;

use credence_ops::application::cli::{cli_help, run_cli};
use credence_ops::log;
use credence_ops::utils::version::build_version;

fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("-h") | Some("--help") | Some("help") => print_help(&args[0]),
        Some("-V") | Some("--version") | Some("version") => println!("credence {}", build_version()),
        Some(_) => {
            log!("credence {} {:?}", build_version(), &args[1..]);
            if let Err(error) = run_cli(&args[1..]) {
                log!("Command failed: {}", error);
                eprintln!("{error}");
                std::process::exit(1);
            }
        }
    }
}

fn print_help(bin: &str) {
    println!(
        "credence {}\n\nUsage:\n  {bin} <command> [flags]\n\nCommands:\n{}",
        build_version(),
        cli_help()
    );
}
