use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "flashfill")]
#[command(about = "Fill a removable device with a random selection from a media library")]
#[command(after_help = "Paths and limits come from the environment: FLASH_DRIVE, MUSIC_LIBRARY, \
HISTORY_FILE, ALLOWED_CAPACITY_DEVIATION, EXPECTED_SIZE_GB, RESERVE_SIZE, THREAD_COUNT.")]
pub struct Cli {
    /// Do not compare the device size against EXPECTED_SIZE_GB
    #[arg(long)]
    pub skip_size_check: bool,
    /// Keep files already on the device instead of clearing it first
    #[arg(long)]
    pub keep_existing: bool,
    /// Hide the live progress gauge
    #[arg(long)]
    pub no_progress: bool,
    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
    /// Log debug detail to stderr
    #[arg(short, long)]
    pub verbose: bool,
}
