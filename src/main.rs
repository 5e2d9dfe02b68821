use deadlinkr::auth::AuthConfig;
use deadlinkr::cli::{Cli, Commands, CrawlOpts};
use deadlinkr::crawler::Crawler;
use deadlinkr::logging;
use deadlinkr::models::LinkResult;
use deadlinkr::report;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let outcome = match cli.command {
        Commands::Scan { url, opts } => run_crawl(&url, &opts, false).await,
        Commands::Check { url, opts } => run_crawl(&url, &opts, true).await,
        Commands::Version => {
            println!("deadlinkr {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_crawl(
    url: &str,
    opts: &CrawlOpts,
    single_page: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&opts.log_level, opts.quiet);

    let auth = AuthConfig::from_flags(
        &opts.auth_basic,
        &opts.auth_bearer,
        &opts.auth_header,
        &opts.auth_cookies,
    )?;

    let config = opts.to_config(single_page);
    let crawler = Crawler::new(config, auth)?;
    crawler.shutdown_manager().install_signal_handlers();

    if !opts.quiet {
        if single_page {
            println!("Checking links on {}", url);
        } else {
            println!("Starting scan of {} with depth {}", url, opts.depth);
        }
    }

    let results = crawler.run(url).await?;
    let broken = results.iter().filter(|r| r.is_broken()).count();

    if !opts.quiet {
        println!(
            "Scan complete. Found {} links, {} broken.",
            results.len(),
            broken
        );
    }

    // --only-external narrows the report, not the crawl
    let reported: Vec<LinkResult> = if opts.only_external {
        results.into_iter().filter(|r| r.is_external).collect()
    } else {
        results
    };

    if !opts.output.is_empty() || !opts.format.is_empty() {
        let output = if opts.output.is_empty() {
            default_output_path(&opts.format)
        } else {
            opts.output.clone()
        };
        report::export_results(&reported, &opts.format, &output)?;
        if !opts.quiet {
            println!("Report written to {}", output);
        }
    } else {
        report::display_results(&reported, opts.show_all);
    }

    Ok(())
}

fn default_output_path(format: &str) -> String {
    format!("deadlinkr-report.{}", format.to_ascii_lowercase())
}
