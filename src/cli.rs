use clap::Parser;
use dirs;

#[derive(Parser, Debug)]
#[command(name = "flockscan")]
#[command(about = "A tool for mapping the geographic spread of a profile's followers and followings")]
#[command(version)]
pub struct Args {
    /// Create default configuration file at ./config/flockscan.toml
    #[arg(long)]
    pub init: bool,

    /// Profile whose follower/following list should be scanned
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Which list to walk: 'followers' (default) or 'following'
    #[arg(short, long, default_value = "followers")]
    pub list: String,

    /// Look up a single profile and print its record instead of scanning a list
    #[arg(long, value_name = "USERNAME", conflicts_with_all = ["profile", "input_file"])]
    pub lookup: Option<String>,

    /// Path to CSV or JSON file of usernames to enrich, skipping collection
    /// CSV: one username per line, or a column named "username"
    /// JSON: array of username strings, or objects with a "username" field
    #[arg(long, value_name = "FILE", conflicts_with = "profile")]
    pub input_file: Option<String>,

    /// AboutAccountQuery id (overrides config and the cached/captured value)
    #[arg(long, value_name = "ID")]
    pub query_id: Option<String>,

    /// Output format: 'csv' (default) or 'json'
    #[arg(short = 'f', long, default_value = "csv")]
    pub output_format: String,

    /// Output directory for the results file (defaults to Desktop)
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Output filename (extension will be set based on format if not provided)
    #[arg(short, long, default_value = "follower_regions")]
    pub output: String,

    /// Continue automatically at each batch checkpoint instead of prompting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Verbose logging (use -v for detailed progress, -vv for debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Export execution logs to a file (specify file path)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Disable colored output (also respects NO_COLOR environment variable)
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Check if running in enrich-only mode (--input-file provided)
    pub fn is_enrich_only(&self) -> bool {
        self.input_file.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        // A scan target is required unless another mode was selected
        if !self.init && self.lookup.is_none() && !self.is_enrich_only() {
            match &self.profile {
                None => {
                    return Err(
                        "Profile is required (use --profile, --input-file, or --lookup)".to_string()
                    )
                }
                Some(p) if p.is_empty() => return Err("Profile cannot be empty".to_string()),
                _ => {}
            }
        }

        if !["followers", "following"].contains(&self.list.as_str()) {
            return Err("List must be 'followers' or 'following'".to_string());
        }

        if !["csv", "json"].contains(&self.output_format.as_str()) {
            return Err("Output format must be 'csv' or 'json'".to_string());
        }

        Ok(())
    }

    pub fn get_default_output_dir() -> Result<String, String> {
        if let Some(desktop_dir) = dirs::desktop_dir() {
            Ok(desktop_dir.to_string_lossy().to_string())
        } else {
            // Fallback to current directory if Desktop can't be found
            Ok(".".to_string())
        }
    }

    pub fn get_output_dir(&self) -> Result<String, String> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::get_default_output_dir(),
        }
    }

    /// Full path of the export file, appending the format extension when the
    /// filename does not already carry one.
    pub fn get_output_path(&self) -> Result<String, String> {
        let dir = self.get_output_dir()?;
        let filename = if self.output.ends_with(&format!(".{}", self.output_format)) {
            self.output.clone()
        } else {
            format!("{}.{}", self.output, self.output_format)
        };
        Ok(std::path::Path::new(&dir).join(filename).to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            init: false,
            profile: Some("someone".to_string()),
            list: "followers".to_string(),
            lookup: None,
            input_file: None,
            query_id: None,
            output_format: "csv".to_string(),
            output_dir: Some("/tmp".to_string()),
            output: "follower_regions".to_string(),
            yes: false,
            verbose: 0,
            log_file: None,
            no_color: false,
        }
    }

    #[test]
    fn test_validate_requires_target() {
        let mut args = base_args();
        args.profile = None;
        assert!(args.validate().is_err());

        args.input_file = Some("list.csv".to_string());
        assert!(args.validate().is_ok());

        args.input_file = None;
        args.lookup = Some("someone".to_string());
        assert!(args.validate().is_ok());

        args.lookup = None;
        args.init = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_list_kind() {
        let mut args = base_args();
        args.list = "following".to_string();
        assert!(args.validate().is_ok());

        args.list = "friends".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_output_format() {
        let mut args = base_args();
        args.output_format = "json".to_string();
        assert!(args.validate().is_ok());

        args.output_format = "xml".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_output_path_extension() {
        let mut args = base_args();
        assert_eq!(args.get_output_path().unwrap(), "/tmp/follower_regions.csv");

        args.output = "results.csv".to_string();
        assert_eq!(args.get_output_path().unwrap(), "/tmp/results.csv");

        args.output_format = "json".to_string();
        assert_eq!(args.get_output_path().unwrap(), "/tmp/results.csv.json");
    }
}
