// src/utils/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

const PROGRESS_CHARS: &str = "█▉▊▋▌▍▎▏  ";

/// Configuration for progress tracking during a clustering run
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show detailed per-stage progress bars
    pub detailed: bool,
    /// Whether to log memory usage when the run finishes
    pub show_memory: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("PROGRESS_ENABLED", true),
            detailed: env_flag("PROGRESS_DETAILED", true),
            show_memory: env_flag("PROGRESS_SHOW_MEMORY", true),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(default)
}

/// Adds a bounded stage bar to `multi_progress`, if progress is enabled.
pub fn stage_bar(
    multi_progress: &Option<MultiProgress>,
    len: u64,
    template: &str,
    message: &str,
) -> Option<ProgressBar> {
    multi_progress.as_ref().map(|mp| {
        let pb = mp.add(ProgressBar::new(len));
        let style = ProgressStyle::default_bar()
            .template(template)
            .map(|s| s.progress_chars(PROGRESS_CHARS))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb
    })
}

/// Adds a spinner to `multi_progress`, if progress is enabled.
pub fn stage_spinner(multi_progress: &Option<MultiProgress>, message: &str) -> Option<ProgressBar> {
    multi_progress.as_ref().map(|mp| {
        let pb = mp.add(ProgressBar::new_spinner());
        let style = ProgressStyle::default_spinner()
            .template("    {spinner:.blue} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_creates_nothing() {
        let config = ProgressConfig {
            enabled: false,
            ..ProgressConfig::default()
        };
        assert!(config.create_multi_progress().is_none());
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());
    }

    #[test]
    fn test_bars_are_none_without_multi_progress() {
        assert!(stage_bar(&None, 5, "{bar} {msg}", "working").is_none());
        assert!(stage_spinner(&None, "working").is_none());
    }

    #[test]
    fn test_stage_bar_tracks_length() {
        let mp = Some(MultiProgress::with_draw_target(
            indicatif::ProgressDrawTarget::hidden(),
        ));
        let pb = stage_bar(&mp, 4, "{bar:20} {pos}/{len} {msg}", "stages").expect("bar");
        pb.inc(1);
        assert_eq!(pb.length(), Some(4));
        assert_eq!(pb.position(), 1);
    }
}
