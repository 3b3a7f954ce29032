use anyhow::Result;
use clap::Parser;
use log::debug;
use pkgapply::{
    commands::{self, config::Config},
    events::{self, LogObserver},
    framework::TargetFramework,
    project::ProjectOptions,
    resolver::DependencyBehavior,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// pkgapply - resolve package dependencies and apply them to a project
///
/// Packages come from a feed directory laid out as <feed>/<id>/<version>/
/// with a package.json in each version directory. The project is a
/// directory holding project.json and the installed packages.json manifest.
///
/// Examples:
///   pkgapply --framework net45 install Web.Helpers
///   pkgapply uninstall Web.Helpers --remove-dependencies
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Package feed directory (also via PKGAPPLY_FEED)
    #[arg(long, env = "PKGAPPLY_FEED", value_name = "PATH", global = true, default_value = ".")]
    feed: PathBuf,

    /// Project directory (also via PKGAPPLY_PROJECT)
    #[arg(long, env = "PKGAPPLY_PROJECT", value_name = "PATH", global = true, default_value = ".")]
    project: PathBuf,

    /// Target framework, e.g. net45 or netstandard2.0
    #[arg(long, value_name = "TFM", global = true)]
    framework: Option<TargetFramework>,

    /// Which satisfying version to prefer
    #[arg(long, value_name = "BEHAVIOR", global = true, default_value_t = DependencyBehavior::Lowest)]
    behavior: DependencyBehavior,

    /// Do not regenerate binding redirects after adding references
    #[arg(long, global = true)]
    no_binding_redirects: bool,

    /// Do not add or remove assembly references
    #[arg(long, global = true)]
    skip_references: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the packages a request resolves to, in install order
    Resolve(PackagesArgs),

    /// Install packages and their dependencies into the project
    Install(PackagesArgs),

    /// Uninstall packages from the project
    Uninstall(UninstallArgs),

    /// List installed packages
    List,
}

#[derive(clap::Args, Debug)]
struct PackagesArgs {
    /// Packages as "id" or "id@range"
    #[arg(value_name = "ID[@RANGE]", required = true)]
    packages: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct UninstallArgs {
    /// Package ids
    #[arg(value_name = "ID", required = true)]
    ids: Vec<String>,

    /// Also remove dependencies nothing else needs
    #[arg(long)]
    remove_dependencies: bool,

    /// Remove even when other packages depend on it
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = Config::new(pkgapply::runtime::RealRuntime, cli.feed, cli.project);
    config.framework = cli.framework;
    config.behavior = cli.behavior;
    config.options = ProjectOptions {
        binding_redirects_disabled: cli.no_binding_redirects,
        skip_assembly_references: cli.skip_references,
    };

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, stopping after the current step...");
                cancel.cancel();
            }
        }
    });

    let mut receiver = events::init();
    let listener = tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            debug!("event: {}", event);
        }
    });

    let observer = Arc::new(LogObserver);
    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve(&config, &args.packages, cancel).await,
        Commands::Install(args) => commands::install(&config, &args.packages, observer, cancel).await,
        Commands::Uninstall(args) => {
            commands::uninstall(
                &config,
                &args.ids,
                args.remove_dependencies,
                args.force,
                observer,
                cancel,
            )
            .await
        }
        Commands::List => commands::list(&config),
    };

    ctrl_c.abort();
    events::shutdown();
    if let Err(e) = listener.await {
        debug!("Event listener ended abnormally: {}", e);
    }
    result
}
