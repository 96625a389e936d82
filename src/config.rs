use crate::operations::ResetPolicy;
use std::{env, path::PathBuf};
use tracing::warn;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub history_path: PathBuf,
    pub reset_policy: ResetPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = match lookup("PORT") {
            Some(value) => value.parse::<u16>().unwrap_or_else(|_| {
                warn!("ignoring invalid PORT '{value}'");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let reset_policy = match lookup("OPIDAS_RESET_POLICY") {
            Some(value) => value.parse().unwrap_or_else(|err| {
                warn!("{err}, using the default policy");
                ResetPolicy::default()
            }),
            None => ResetPolicy::default(),
        };

        Self {
            port,
            data_path: lookup("APP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/state.json")),
            history_path: lookup("APP_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/reset_history.jsonl")),
            reset_policy,
        }
    }
}
