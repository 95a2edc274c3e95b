use anyhow::Result;
use clap::{Parser, Subcommand};
use claudia::{config, monitor::Monitor, settings::SettingsResolver};

#[derive(Parser, Debug)]
#[command(name = "claudia")]
#[command(about = "Live monitor for Claude Code sessions, tools and settings")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved settings summary
    Settings {
        /// Project directory whose project/local layers are included
        #[arg(long)]
        project: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the event stream
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claudia=info".parse()?),
        )
        .init();

    if args.init {
        let path = config::init(args.config.as_deref())?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let config = config::load(args.config.as_deref())?;

    if let Some(Command::Settings { project }) = &args.command {
        let resolver = SettingsResolver::new(&config.paths.claude_dir);
        let summary = resolver.get_settings_summary(project.as_deref(), None);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let monitor = Monitor::new(&config);
    let mut subscription = monitor.bus().subscribe();

    let printer = tokio::spawn(async move {
        while let Some(message) = subscription.receiver.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize {}: {}", message.event_type, e),
            }
        }
    });

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
        })
        .await?;

    // The monitor owned the last bus handle, so the printer sees the channel close
    if let Err(e) = printer.await {
        tracing::warn!("Event printer task failed: {}", e);
    }
    Ok(())
}
