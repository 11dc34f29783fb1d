use clap::Parser;
use modsec::cli::commands::generate::GenerateArgs;
use modsec::cli::{exit_code, Cli, Commands};
use modsec::logging::{init_logging, LogLevel};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogLevel::from_flags(cli.verbose, cli.quiet)) {
        modsec::cli::output::warning(&e.to_string());
    }

    let result = match cli.command {
        Commands::Generate {
            ref config,
            ref sections,
            ref out,
            ref root,
            ref key_dir,
            ref user_dir,
            ref seed,
            force_generate,
            force_load,
        } => {
            let args = GenerateArgs {
                config,
                sections,
                out: out.as_deref(),
                root: root.as_deref(),
                key_dir: key_dir.as_deref(),
                user_dir: user_dir.as_deref(),
                seed: seed.as_deref(),
                force_generate,
                force_load,
            };
            modsec::cli::commands::generate::execute(&cli, &args)
        }
        Commands::Check { ref config } => modsec::cli::commands::check::execute(config),
        Commands::Schemes => modsec::cli::commands::schemes::execute(),
    };

    if let Err(e) = result {
        tracing::debug!(kind = ?e.kind(), "command failed");
        modsec::cli::output::error(&e.to_string());
        std::process::exit(exit_code(&e));
    }
}
