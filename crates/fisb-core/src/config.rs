//! Runtime configuration (spec §6 "Configuration (enumerated)"). Deserialized
//! from TOML the way the teacher deserializes its own runtime config, with
//! a `Default` impl supplying the original implementation's documented
//! defaults so the CLI runs sensibly unconfigured.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub image_directory: String,
    pub maint_interval: u64,
    pub quiet_image_seconds: u64,
    pub process_images: bool,
    pub annotate_crl_reports: bool,
    pub immediate_crl_update: bool,
    pub expire_messages: bool,
    pub metar_expire: i64,
    pub fisb_unavail_expire: i64,
    pub pirep_expire: i64,
    pub pirep_use_report_time_to_expire: bool,
    pub twgo_default_expire: i64,
    pub bypass_twgo_smart_expiration: bool,
    pub notam_perm_time: String,
    pub segment_expire: i64,
    pub twgo_expire: i64,
    pub dedup_expire_msg_time: i64,
    pub dedup_expunge_interval: i64,
    pub calculate_rsr: bool,
    pub rsr_window_seconds: u64,
    pub rsr_stride_seconds: u64,
    pub block_sua_messages: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            image_directory: "images".to_string(),
            maint_interval: 10,
            quiet_image_seconds: 10,
            process_images: true,
            annotate_crl_reports: true,
            immediate_crl_update: true,
            expire_messages: true,
            metar_expire: 150,
            fisb_unavail_expire: 20,
            pirep_expire: 90,
            pirep_use_report_time_to_expire: false,
            twgo_default_expire: 61,
            bypass_twgo_smart_expiration: false,
            notam_perm_time: "2099-12-31T23:59:59Z".to_string(),
            segment_expire: 5,
            twgo_expire: 120,
            dedup_expire_msg_time: 20,
            dedup_expunge_interval: 5,
            calculate_rsr: false,
            rsr_window_seconds: 120,
            rsr_stride_seconds: 1,
            block_sua_messages: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.maint_interval, 10);
        assert!(!cfg.block_sua_messages);
    }

    #[test]
    fn overrides_apply() {
        let cfg = Config::from_toml_str("metar_expire = 180\n").unwrap();
        assert_eq!(cfg.metar_expire, 180);
        assert_eq!(cfg.maint_interval, 10);
    }
}
