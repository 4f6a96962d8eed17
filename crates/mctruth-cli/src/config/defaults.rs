pub struct DefaultsConfig {
    pub integrity_policy: String,
    pub log_label_warnings: bool,
    pub parallel: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            integrity_policy: "report".to_string(),
            log_label_warnings: true,
            parallel: true,
        }
    }
}
