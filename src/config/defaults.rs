use super::constants::*;

pub(crate) fn max_input_length() -> usize {
    MAX_INPUT_LENGTH
}

pub(crate) fn endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

pub(crate) fn timeout_secs() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_SECS)
}

pub(crate) fn swipe_delay_ms() -> u64 {
    SWIPE_DELAY_MS
}

pub(crate) fn log_level() -> Option<String> {
    Some("info".to_string())
}

pub(crate) fn log_file_path() -> String {
    LOG_FILE_PATH.to_string()
}
