mod cli;
mod commands;
mod config;
mod output;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Ddl(args) => commands::ddl(args),
        cli::Command::Init(args) => commands::init(args).await,
        cli::Command::Export(args) => commands::export(args).await,
        cli::Command::Import(args) => commands::import(args).await,
        cli::Command::Backup(args) => commands::backup(args).await,
        cli::Command::Count(args) => commands::count(args).await,
        cli::Command::Select(args) => commands::select(args).await,
    }
}
