use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "chordgrid", about = "Beat-synchronous chord chart from an audio file")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Shift the grid by this many beats (negative drops leading beats)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i32,

    /// Highlight the beat sounding at this time (seconds)
    #[arg(long)]
    pub at: Option<f32>,

    /// Walk playback in steps of this many seconds, printing each highlight change
    #[arg(long, value_name = "STEP")]
    pub follow: Option<f32>,

    /// Write the session as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Config file (defaults to ./chordgrid.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Cancel the analysis if it runs longer than this many seconds
    #[arg(long)]
    pub time_limit: Option<f32>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// `--time-limit` as a duration; rejects negative, NaN and unrepresentable values.
    pub fn time_limit(&self) -> Result<Option<Duration>> {
        match self.time_limit {
            None => Ok(None),
            Some(secs) => match Duration::try_from_secs_f32(secs) {
                Ok(limit) => Ok(Some(limit)),
                Err(e) => bail!("Invalid --time-limit {}: {}", secs, e),
            },
        }
    }

    /// `--follow` step, which must be a positive finite number of seconds.
    pub fn follow_step(&self) -> Result<Option<f32>> {
        match self.follow {
            Some(step) if !(step.is_finite() && step > 0.0) => {
                bail!("Invalid --follow step {}: must be a positive number of seconds", step)
            }
            step => Ok(step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["chordgrid", "song.wav"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn time_limit_converts_seconds() {
        let cli = parse(&["--time-limit", "2.5"]);
        assert_eq!(cli.time_limit().unwrap(), Some(Duration::from_millis(2500)));
        assert_eq!(parse(&[]).time_limit().unwrap(), None);
    }

    #[test]
    fn unrepresentable_time_limit_is_an_error() {
        assert!(parse(&["--time-limit", "inf"]).time_limit().is_err());
        assert!(parse(&["--time-limit", "1e30"]).time_limit().is_err());
        assert!(parse(&["--time-limit", "NaN"]).time_limit().is_err());
        assert!(parse(&["--time-limit=-1"]).time_limit().is_err());
    }

    #[test]
    fn follow_step_must_be_positive() {
        assert_eq!(parse(&["--follow", "0.25"]).follow_step().unwrap(), Some(0.25));
        assert!(parse(&["--follow", "0"]).follow_step().is_err());
        assert!(parse(&["--follow", "inf"]).follow_step().is_err());
        assert_eq!(parse(&[]).follow_step().unwrap(), None);
    }

    #[test]
    fn negative_offset_is_accepted() {
        assert_eq!(parse(&["--offset", "-3"]).offset, -3);
    }
}
