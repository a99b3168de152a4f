//! Minimal CLI parsing for headless operation.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct CliOptions {
    /// Run a datasource update before exiting
    pub update: bool,
    /// Datasources given on the command line (override the configured set)
    pub datasources: Vec<PathBuf>,
    pub help: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    fn parse(mut args: impl Iterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--update" | "-u" => options.update = true,
                "--help" | "-h" => options.help = true,
                "--datasource" => {
                    if let Some(value) = args.next() {
                        options.datasources.push(PathBuf::from(value));
                    }
                }
                _ if arg.starts_with("--datasource=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.datasources.push(PathBuf::from(value));
                    }
                }
                other => {
                    eprintln!("ignoring unknown argument: {other}");
                }
            }
        }
        options
    }

    pub fn print_syntax() {
        println!("curator - media library manager (headless)");
        println!();
        println!("Usage: curator [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -u, --update              scan datasources and refresh the library");
        println!("      --datasource <PATH>   scan this datasource (repeatable; overrides");
        println!("                            the DATASOURCE_PATHS environment variable)");
        println!("  -h, --help                print this help");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_update_and_datasources() {
        let options = parse(&["--update", "--datasource", "/media/movies"]);
        assert!(options.update);
        assert_eq!(options.datasources, vec![PathBuf::from("/media/movies")]);
    }

    #[test]
    fn test_parse_datasource_equals_form() {
        let options = parse(&["-u", "--datasource=/media/shows"]);
        assert!(options.update);
        assert_eq!(options.datasources, vec![PathBuf::from("/media/shows")]);
    }

    #[test]
    fn test_unknown_arguments_are_ignored() {
        let options = parse(&["--frobnicate"]);
        assert!(!options.update);
        assert!(!options.help);
    }
}
