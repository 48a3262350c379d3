use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera index (default: try 1, then 0)
    #[arg(short, long)]
    pub cam_index: Option<u32>,

    /// List available cameras
    #[arg(long)]
    pub list: bool,

    /// Lock mode/filter changes and keep logs quiet
    #[arg(long)]
    pub event_mode: bool,

    /// Config file
    #[arg(long, default_value = magic_booth::config::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Hand landmark model (overrides config)
    #[arg(long)]
    pub model: Option<PathBuf>,

    #[arg(long, env = "SUPABASE_URL", hide_env_values = true)]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,
}

impl Args {
    /// Both Supabase settings, if present and non-empty.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}
