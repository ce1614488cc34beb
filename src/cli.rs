use crate::config::RigConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

pub const USAGE: &str =
    "Usage: rig_buffer_check [--config <file>] [--ppu <pixels>] [--pretty on|off] <buffer.json>...";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckOptions {
    pub config: Option<PathBuf>,
    pub pixels_per_unit: Option<f32>,
    pub pretty: Option<bool>,
    pub paths: Vec<PathBuf>,
    pub show_help: bool,
}

impl CheckOptions {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = CheckOptions::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw) = iter.next() {
            let arg = raw.as_ref();
            let Some(key) = arg.strip_prefix("--") else {
                options.paths.push(PathBuf::from(arg));
                continue;
            };
            if key == "help" {
                options.show_help = true;
                continue;
            }
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{arg}'"))?.as_ref().to_string();
            match key {
                "config" => options.config = Some(PathBuf::from(value)),
                "ppu" => {
                    let ppu = value.parse::<f32>().with_context(|| format!("Invalid ppu '{value}'"))?;
                    if !(ppu.is_finite() && ppu > 0.0) {
                        bail!("Invalid ppu '{value}'. Pixels per unit must be positive.");
                    }
                    options.pixels_per_unit = Some(ppu);
                }
                "pretty" => options.pretty = Some(parse_bool_flag("pretty", &value)?),
                _ => bail!("Unknown flag '{arg}'. Supported flags: --config, --ppu, --pretty, --help."),
            }
        }
        Ok(options)
    }

    pub fn config_overrides(&self) -> RigConfigOverrides {
        RigConfigOverrides { pixels_per_unit: self.pixels_per_unit, pretty_buffer: self.pretty }
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_paths() {
        let args = ["check", "--ppu", "64", "a.json", "--pretty", "on", "b.json"];
        let options = CheckOptions::parse(args).expect("parse options");
        assert_eq!(options.pixels_per_unit, Some(64.0));
        assert_eq!(options.pretty, Some(true));
        assert_eq!(options.paths, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert!(!options.config_overrides().is_empty());
    }

    #[test]
    fn latest_flag_wins() {
        let options =
            CheckOptions::parse(["check", "--pretty", "on", "--pretty", "off"]).expect("parse options");
        assert_eq!(options.pretty, Some(false));
    }

    #[test]
    fn missing_value_errors() {
        let err = CheckOptions::parse(["check", "--ppu"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_bad_ppu() {
        let err = CheckOptions::parse(["check", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        assert!(CheckOptions::parse(["check", "--ppu", "0"]).is_err());
        assert!(CheckOptions::parse(["check", "--ppu", "abc"]).is_err());
    }

    #[test]
    fn help_takes_no_value() {
        let options = CheckOptions::parse(["check", "--help", "x.json"]).expect("parse options");
        assert!(options.show_help);
        assert_eq!(options.paths.len(), 1);
    }
}
