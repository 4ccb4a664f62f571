use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use mailer::commands::{self, send::SendCommand, validate::ValidateCommand};
use mailer_utils::mailer_version;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Completion { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                env!("CARGO_BIN_NAME"),
                &mut std::io::stdout(),
            );
            return Ok(());
        }
        Command::Validate(command) => return command.invoke(),
        _ => {}
    }

    init_tracing();

    let config = mailer_config::load().context("Failed to load config")?;

    match cli.command {
        Command::Send(command) => command.invoke(config).await?,
        Command::Test { recipient } => commands::smtp::test(config, recipient).await?,
        Command::Ping => commands::smtp::ping(config).await?,
        Command::CheckConfig { verbose } => {
            mailer::environment::mail_service(&config.mail)?;
            verbose.then(|| println!("{config:#?}"));
        }
        Command::Completion { .. } | Command::Validate(_) => unreachable!(),
    }

    Ok(())
}

#[derive(Debug, Parser)]
#[command(version = mailer_version())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a mail, either from a template or with explicit content
    #[command(aliases(["s"]))]
    Send(SendCommand),
    /// Test email deliverability
    #[command(aliases(["t"]))]
    Test {
        /// Receiver of the test mail
        recipient: String,
    },
    /// Check whether the SMTP server is reachable
    Ping,
    /// Check whether an email address is valid
    Validate(ValidateCommand),
    /// Validate configuration and templates
    CheckConfig {
        /// Print a debug representation of the config
        #[arg(short, long)]
        verbose: bool,
    },
    /// Generate shell completions
    Completion {
        /// The shell to generate completions for
        #[clap(value_enum)]
        shell: Shell,
    },
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    #[cfg(tracing_pretty)]
    let fmt_layer = fmt_layer.pretty();

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(EnvFilter::from_default_env()))
        .init();
}
