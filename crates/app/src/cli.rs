//! Command line arguments.
//!
//! The launcher takes a handful of flags; anything unrecognized is ignored
//! so the binary still starts under debuggers and wrappers that append
//! their own arguments. A recognized flag with a missing or malformed
//! value is a configuration error and aborts startup.

use std::path::PathBuf;

use tracing::warn;

use facet_core::Error;

/// Parsed launch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Prefer a software (CPU) device over dedicated hardware.
    pub warp: bool,
    /// OBJ model to draw instead of the built-in cube.
    pub model: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            warp: false,
            model: None,
        }
    }
}

impl Args {
    /// Parses launch options from an argument iterator.
    ///
    /// Recognized flags:
    /// - `-w`, `--width <pixels>`
    /// - `-h`, `--height <pixels>`
    /// - `-warp`, `--warp`
    /// - `--model <path>`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a recognized flag is missing its
    /// value or the value does not parse as a positive integer.
    pub fn parse_from<I>(args: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-w" | "--width" => {
                    parsed.width = parse_dimension(&arg, iter.next())?;
                }
                "-h" | "--height" => {
                    parsed.height = parse_dimension(&arg, iter.next())?;
                }
                "-warp" | "--warp" => {
                    parsed.warp = true;
                }
                "--model" => match iter.next() {
                    Some(path) => parsed.model = Some(PathBuf::from(path)),
                    None => {
                        return Err(Error::Config("--model is missing a path".to_string()));
                    }
                },
                other => {
                    warn!("Ignoring unrecognized argument '{}'", other);
                }
            }
        }

        Ok(parsed)
    }

    /// Parses the process's own arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a missing or malformed flag value.
    pub fn parse() -> Result<Self, Error> {
        Self::parse_from(std::env::args().skip(1))
    }
}

fn parse_dimension(flag: &str, value: Option<String>) -> Result<u32, Error> {
    let value =
        value.ok_or_else(|| Error::Config(format!("{} is missing a value", flag)))?;
    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(Error::Config(format!(
            "invalid value '{}' for {}, expected a positive pixel count",
            value, flag
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, Error> {
        Args::parse_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_without_arguments() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.width, 1280);
        assert_eq!(args.height, 720);
        assert!(!args.warp);
        assert_eq!(args.model, None);
    }

    #[test]
    fn short_and_long_dimension_flags() {
        let args = parse(&["-w", "1920", "-h", "1080"]).unwrap();
        assert_eq!((args.width, args.height), (1920, 1080));

        let args = parse(&["--width", "640", "--height", "480"]).unwrap();
        assert_eq!((args.width, args.height), (640, 480));
    }

    #[test]
    fn warp_accepts_both_spellings() {
        assert!(parse(&["-warp"]).unwrap().warp);
        assert!(parse(&["--warp"]).unwrap().warp);
    }

    #[test]
    fn model_takes_a_path() {
        let args = parse(&["--model", "assets/head.obj"]).unwrap();
        assert_eq!(args.model, Some(PathBuf::from("assets/head.obj")));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(parse(&["-w", "huge"]), Err(Error::Config(_))));
        assert!(matches!(parse(&["--height", "0"]), Err(Error::Config(_))));
        assert!(matches!(parse(&["-h", "-5"]), Err(Error::Config(_))));
    }

    #[test]
    fn missing_values_are_rejected() {
        assert!(matches!(parse(&["--warp", "-w"]), Err(Error::Config(_))));
        assert!(matches!(parse(&["--model"]), Err(Error::Config(_))));
    }

    #[test]
    fn unrecognized_arguments_are_skipped() {
        let args = parse(&["--frobnicate", "-w", "800"]).unwrap();
        assert_eq!(args.width, 800);
    }
}
