//! Typed view of the YAML configuration document.
//!
//! One document, keyed by section: `ft8ctrl` for the controller itself,
//! `BlackList` for calls never to answer, and one section per configured
//! selector. Known sections parse into typed structs that reject unknown
//! keys; selector sections are handed to the selector registry.
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILENAME: &str = "ft8ctrl.yaml";
const CONFIG_LOCATIONS: &[&str] = &["/etc", "~/.local", "."];

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file {0} not found")]
    NotFound(String),
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("configuration syntax error: {0}")]
    Syntax(#[from] serde_yaml::Error),
}

/// A scalar that may arrive as a string or a number; zone lists in
/// particular are commonly written as bare integers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConfigItem {
    Text(String),
    Number(i64),
}

impl ConfigItem {
    pub fn as_string(&self) -> String {
        match self {
            ConfigItem::Text(text) => text.clone(),
            ConfigItem::Number(number) => number.to_string(),
        }
    }
}

fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(one) => vec![one],
        OneOrMany::Many(many) => many,
    })
}

fn default_tx_retries() -> u32 {
    5
}

fn default_retry_time() -> u32 {
    15
}

fn default_logfile_name() -> PathBuf {
    PathBuf::from("ft8ctrl.log")
}

fn default_logfile_size() -> u64 {
    8 << 16
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Controller {
    pub db_name: PathBuf,
    pub my_call: String,
    pub my_grid: String,
    pub wsjt_ip: String,
    pub wsjt_port: u16,
    #[serde(default)]
    pub logger_ip: Option<String>,
    #[serde(default)]
    pub logger_port: Option<u16>,
    #[serde(default)]
    pub follow_frequency: bool,
    #[serde(default)]
    pub tx_power: Option<u32>,
    #[serde(default = "default_tx_retries")]
    pub tx_retries: u32,
    #[serde(default = "default_retry_time")]
    pub retry_time: u32,
    #[serde(deserialize_with = "string_or_list")]
    pub call_selector: Vec<String>,
    #[serde(default = "default_logfile_name")]
    pub logfile_name: PathBuf,
    #[serde(default = "default_logfile_size")]
    pub logfile_size: u64,
    #[serde(default)]
    pub dxcc_path: Option<PathBuf>,
    #[serde(default)]
    pub lotw_path: Option<PathBuf>,
}

impl Controller {
    /// Home of the prefix source and its cache.
    pub fn dxcc_home(&self) -> PathBuf {
        self.dxcc_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ft8ctrl"))
    }

    pub fn lotw_cache(&self) -> PathBuf {
        self.lotw_path
            .clone()
            .unwrap_or_else(crate::lotw::Lotw::default_cache_path)
    }
}

#[derive(Debug, Deserialize)]
pub struct Document {
    pub ft8ctrl: Controller,
    #[serde(rename = "BlackList", default)]
    blacklist: Vec<String>,
    #[serde(flatten)]
    sections: HashMap<String, serde_yaml::Value>,
}

impl Document {
    /// Load the named file, or walk the standard locations for
    /// `ft8ctrl.yaml` when none is given.
    pub fn load(filename: Option<&Path>) -> Result<Document, Error> {
        let path = match filename {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::NotFound(path.display().to_string()));
                }
                path.to_path_buf()
            }
            None => Self::search()?,
        };
        debug!("reading config file: {}", path.display());
        Self::from_str(&fs::read_to_string(path)?)
    }

    pub fn from_str(text: &str) -> Result<Document, Error> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn search() -> Result<PathBuf, Error> {
        let home = std::env::var("HOME").unwrap_or_default();
        for location in CONFIG_LOCATIONS {
            let base = match location.strip_prefix("~/") {
                Some(rest) => Path::new(&home).join(rest),
                None => PathBuf::from(location),
            };
            let candidate = base.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(Error::NotFound(CONFIG_FILENAME.to_string()))
    }

    /// Callsigns never to reply to; uppercased, order preserved by the set.
    pub fn blacklist(&self) -> BTreeSet<String> {
        self.blacklist.iter().map(|call| call.to_uppercase()).collect()
    }

    /// The raw configuration section for a selector, when present.
    pub fn section(&self, name: &str) -> Option<&serde_yaml::Value> {
        self.sections.get(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "
ft8ctrl:
  db_name: /tmp/auto_ft8.sql
  my_call: K1ABC
  my_grid: CM87
  wsjt_ip: 127.0.0.1
  wsjt_port: 2238
  call_selector:
    - DXCC100
    - Any
BlackList:
  - w1spm
CQZone:
  list: [3, 4]
DXCC100:
  lotw_users_only: true
Any: {}
";

    #[test]
    fn parses_the_controller_section() {
        let doc = Document::from_str(SAMPLE).unwrap();
        let controller = &doc.ft8ctrl;
        assert_eq!(controller.my_call, "K1ABC");
        assert_eq!(controller.wsjt_port, 2238);
        assert_eq!(controller.call_selector, vec!["DXCC100", "Any"]);
        // defaults
        assert_eq!(controller.tx_retries, 5);
        assert_eq!(controller.retry_time, 15);
        assert!(!controller.follow_frequency);
    }

    #[test]
    fn single_selector_is_accepted_as_a_scalar() {
        let doc = Document::from_str(
            "
ft8ctrl:
  db_name: /tmp/db.sql
  my_call: K1ABC
  my_grid: CM87
  wsjt_ip: 127.0.0.1
  wsjt_port: 2238
  call_selector: Any
",
        )
        .unwrap();
        assert_eq!(doc.ft8ctrl.call_selector, vec!["Any"]);
    }

    #[test]
    fn blacklist_is_uppercased() {
        let doc = Document::from_str(SAMPLE).unwrap();
        assert!(doc.blacklist().contains("W1SPM"));
    }

    #[test]
    fn selector_sections_are_reachable() {
        let doc = Document::from_str(SAMPLE).unwrap();
        assert!(doc.section("CQZone").is_some());
        assert!(doc.section("Grid").is_none());
    }

    #[test]
    fn unknown_controller_keys_fail_loudly() {
        let result = Document::from_str(
            "
ft8ctrl:
  db_name: /tmp/db.sql
  my_call: K1ABC
  my_grid: CM87
  wsjt_ip: 127.0.0.1
  wsjt_port: 2238
  call_selector: Any
  follow_frequencies: true
",
        );
        assert!(result.is_err());
    }

    #[test]
    fn numeric_items_coerce_to_strings() {
        let items: Vec<ConfigItem> = serde_yaml::from_str("[3, '4', NA]").unwrap();
        let strings: Vec<String> = items.iter().map(ConfigItem::as_string).collect();
        assert_eq!(strings, vec!["3", "4", "NA"]);
    }
}
