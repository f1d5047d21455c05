use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

/// Command-line overrides applied on top of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub bundle: Option<PathBuf>,
    pub eval: Vec<String>,
    pub run_ms: Option<u64>,
    pub log_level: Option<String>,
    /// Where to write the final scene as JSON; `-` is stdout.
    pub dump_scene: Option<String>,
}

const USAGE: &str = "Supported flags: --config, --bundle, --eval, --run-ms, --log-level, --dump-scene.";

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // program name
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. {USAGE}");
            };
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?
                .as_ref()
                .to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "bundle" => overrides.bundle = Some(PathBuf::from(value)),
                "eval" => overrides.eval.push(value),
                "run-ms" => {
                    overrides.run_ms =
                        Some(value.parse::<u64>().with_context(|| format!("Invalid run-ms '{value}'"))?);
                }
                "log-level" => overrides.log_level = Some(value),
                "dump-scene" => overrides.dump_scene = Some(value),
                _ => bail!("Unknown flag '{flag}'. {USAGE}"),
            }
        }
        Ok(overrides)
    }
}
