use icon_locator::locator::{ConfigFileError, LocateConfig};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Locate(Args),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub icon: PathBuf,
    pub screen: PathBuf,
    pub config_path: Option<PathBuf>,
    pub scales: Option<Vec<f32>>,
    pub threshold: Option<f32>,
    pub annotate_dir: Option<PathBuf>,
    pub debug_mode: bool,
    pub json: bool,
}

impl Command {
    pub fn parse() -> Result<Self, String> {
        Self::parse_from(std::env::args().skip(1))
    }

    /// Parse flags (program name already removed)
    pub fn parse_from<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut icon: Option<PathBuf> = None;
        let mut screen: Option<PathBuf> = None;
        let mut config_path: Option<PathBuf> = None;
        let mut scales: Option<Vec<f32>> = None;
        let mut threshold: Option<f32> = None;
        let mut annotate_dir: Option<PathBuf> = None;
        let mut debug_mode = false;
        let mut json = false;

        for arg in args {
            if arg == "--help" || arg == "-h" {
                return Ok(Command::Help);
            } else if arg == "--version" || arg == "-v" {
                return Ok(Command::Version);
            } else if arg == "--debug" {
                debug_mode = true;
            } else if arg == "--json" {
                json = true;
            } else if let Some(val) = arg.strip_prefix("--icon=") {
                icon = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--screen=") {
                screen = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--config=") {
                config_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--annotate-dir=") {
                annotate_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--threshold=") {
                threshold = Some(
                    val.parse::<f32>()
                        .map_err(|_| format!("Invalid threshold value: {}", val))?,
                );
            } else if let Some(val) = arg.strip_prefix("--scales=") {
                let parsed: Result<Vec<f32>, _> =
                    val.split(',').map(|s| s.trim().parse::<f32>()).collect();
                scales = Some(parsed.map_err(|_| format!("Invalid scales list: {}", val))?);
            } else {
                return Err(format!("Unknown argument: {}", arg));
            }
        }

        let icon = icon.ok_or_else(|| "Missing --icon=PATH".to_string())?;
        let screen = screen.ok_or_else(|| "Missing --screen=PATH".to_string())?;

        Ok(Command::Locate(Args {
            icon,
            screen,
            config_path,
            scales,
            threshold,
            annotate_dir,
            debug_mode,
            json,
        }))
    }
}

impl Args {
    /// Config file (or defaults), then command-line overrides, then validation
    pub fn build_config(&self) -> Result<LocateConfig, ConfigFileError> {
        let mut config = match &self.config_path {
            Some(path) => LocateConfig::load_toml(path)?,
            None => LocateConfig::default(),
        };
        if let Some(scales) = &self.scales {
            config.scales = scales.clone();
        }
        if let Some(threshold) = self.threshold {
            config.correlation_threshold = threshold;
        }
        if let Some(dir) = &self.annotate_dir {
            config.diagnostics_dir = Some(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn print_help() {
    println!("🔍 Icon Locator");
    println!();
    println!("USAGE:");
    println!("    icon-locator --icon=PATH --screen=PATH [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    --icon=PATH         Reference icon image");
    println!("    --screen=PATH       Screen capture to search");
    println!("    --config=FILE       TOML file with locator settings");
    println!("    --scales=A,B,..     Template scale factors (default: 0.5,0.75,1,1.25,1.5,2)");
    println!("    --threshold=N       Minimum edge correlation, 0..1 (default: 0.7)");
    println!("    --annotate-dir=DIR  Write an annotated screen for each match");
    println!("    --json              Print the full report as JSON");
    println!("    --debug             Enable debug logging");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    icon-locator --icon=notepad_icon.png --screen=desktop.png");
    println!("    icon-locator --icon=icon.png --screen=desktop.png --scales=1,1.5 --annotate-dir=annotated");
}
