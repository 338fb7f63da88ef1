mod app;
mod cli;

fn main() {
    let cli = cli::parse();
    std::process::exit(app::run(cli));
}
