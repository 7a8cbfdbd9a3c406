/// Max characters accepted for a prompt or a prefix
pub const MAX_INPUT_LENGTH: usize = 100_000;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Delay between dropping the last reply and asking for a new one
pub const SWIPE_DELAY_MS: u64 = 500;

pub const LOG_FILE_PATH: &str = "/tmp/convo.log";

pub const ISSUE_URL: &str = "https://github.com/OE-LUCIFER/Webscout";
