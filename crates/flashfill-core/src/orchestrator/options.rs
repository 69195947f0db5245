/// Switches for a single fill run.
#[derive(Clone, Debug)]
pub struct FillOptions {
    /// Accept any device size instead of enforcing the expected-size band.
    pub skip_capacity_check: bool,
    /// Empty the device before copying.
    pub clear_destination: bool,
    /// Draw the live gauge on stderr.
    pub show_progress: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            skip_capacity_check: false,
            clear_destination: true,
            show_progress: true,
        }
    }
}
