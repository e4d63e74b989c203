use clap::Parser;
use miette::Result;
use sigstat::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global),
        Commands::Run(args) => commands::run::run(args, &global),
        Commands::Analyze(args) => commands::analyze::run(args, &global),
        Commands::Limits(cmd) => commands::limits::run(cmd, &global),
        Commands::Report(args) => commands::report::run(args, &global),
    }
}
