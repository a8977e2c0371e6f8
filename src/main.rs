mod args;

use args::{Args, Command, print_help};
use icon_locator::locator::{IconLocator, LocalizationResult, ReferenceIcon};
use std::process::ExitCode;

fn main() -> ExitCode {
    let command = match Command::parse() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("❌ {}", e);
            print_help();
            return ExitCode::from(2);
        }
    };

    match command {
        Command::Help => {
            print_help();
            ExitCode::SUCCESS
        }
        Command::Version => {
            println!("{}", version_line());
            ExitCode::SUCCESS
        }
        Command::Locate(args) => run(args),
    }
}

fn version_line() -> String {
    format!(
        "Icon Locator v{} (built {})",
        env!("APP_VERSION_DISPLAY"),
        env!("ICON_LOCATOR_BUILD_DATE")
    )
}

fn run(args: Args) -> ExitCode {
    let default_filter = if args.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match args.build_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ {e}");
            return ExitCode::from(2);
        }
    };

    let located = IconLocator::new(config).and_then(|locator| {
        let reference = ReferenceIcon::load(&args.icon)?;
        locator.locate_detailed(&reference, &args.screen)
    });

    match located {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        log::error!("❌ Could not serialize report: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("{}", report.result);
                if let Some(path) = &report.diagnostic_image {
                    println!("🖍️ {}", path.display());
                }
            }
            match report.result {
                LocalizationResult::Found { .. } => ExitCode::SUCCESS,
                LocalizationResult::NotFound => ExitCode::from(1),
            }
        }
        Err(e) => {
            log::error!("❌ {e}");
            ExitCode::from(2)
        }
    }
}
