mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;
mod toc;
mod wiki;

fn main() {
    env_loader::load_dotenv();

    if let Err(err) = cli::run() {
        log::debug!("event=command_failed err={err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
