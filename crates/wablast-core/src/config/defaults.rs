pub(super) fn default_name() -> String {
    "wablast".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.wablast".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_true() -> bool {
    true
}
pub(super) fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
pub(super) fn default_api_port() -> u16 {
    5000
}
pub(super) fn default_max_upload_mb() -> usize {
    16
}
pub(super) fn default_db_path() -> String {
    "~/.wablast/data/wablast.db".to_string()
}
pub(super) fn default_bridge_url() -> String {
    "http://127.0.0.1:3000".to_string()
}
pub(super) fn default_request_timeout_secs() -> u64 {
    60
}
pub(super) fn default_send_timeout_secs() -> u64 {
    30
}
