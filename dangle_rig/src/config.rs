use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use dangle_scene::AttrValue;
use glam::Vec3;
use toml::Value;

use crate::binder::BinderOptions;
use crate::compositor::{CompositeStrategy, DEFAULT_BLEND_WEIGHT};

pub const DEFAULT_ROOT_GROUP: &str = "sim_GP";
pub const DEFAULT_WORK_SUFFIX: &str = "_work";

#[derive(Debug, Clone, PartialEq)]
pub struct RigConfig {
    /// Prefix for groups and the simulation context. Inferred from the
    /// selection when `None`.
    pub prefix: Option<String>,
    pub root_group: String,
    pub work_suffix: String,
    pub twist_reference: bool,
    pub follow_parent: bool,
    pub strategy: CompositeStrategy,
    pub binder: BinderOptions,
    /// Attributes written onto the simulation context after each run.
    pub context_settings: BTreeMap<String, AttrValue>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            root_group: DEFAULT_ROOT_GROUP.to_string(),
            work_suffix: DEFAULT_WORK_SUFFIX.to_string(),
            twist_reference: true,
            follow_parent: true,
            strategy: CompositeStrategy::default(),
            binder: BinderOptions::default(),
            context_settings: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    ParseToml(toml::de::Error),
    InvalidField(&'static str, String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::ParseToml(err) => write!(f, "{err}"),
            Self::InvalidField(field, reason) => write!(f, "invalid field `{field}`: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::ParseToml(value)
    }
}

pub fn load_rig_toml(path: &Path) -> Result<RigConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_rig_toml(&contents)
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidField(field, reason.to_string())
}

fn string_field<'a>(
    table: &'a toml::Table,
    key: &str,
    field: &'static str,
) -> Result<Option<&'a str>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Err(invalid(field, "must not be empty")),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(invalid(field, "expected a string")),
    }
}

fn bool_field(
    table: &toml::Table,
    key: &str,
    field: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| invalid(field, "expected true or false")),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Float(v) => Some(*v),
        Value::Integer(v) => Some(*v as f64),
        _ => None,
    }
}

fn table_field<'a>(
    table: &'a toml::Table,
    key: &str,
    field: &'static str,
) -> Result<Option<&'a toml::Table>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_table()
            .map(Some)
            .ok_or_else(|| invalid(field, "expected a table")),
    }
}

fn parse_strategy(table: &toml::Table) -> Result<CompositeStrategy, ConfigError> {
    let weight = match table.get("weight") {
        None => DEFAULT_BLEND_WEIGHT,
        Some(value) => {
            let w = number(value).ok_or_else(|| invalid("compositor.weight", "expected a number"))?;
            if !(0.0..=1.0).contains(&w) {
                return Err(invalid("compositor.weight", "must be between 0 and 1"));
            }
            w as f32
        }
    };

    match string_field(table, "strategy", "compositor.strategy")? {
        None | Some("blend") => Ok(CompositeStrategy::Blend { weight }),
        Some("direct") => Ok(CompositeStrategy::Direct),
        Some(other) => Err(ConfigError::InvalidField(
            "compositor.strategy",
            format!("unknown strategy `{other}`, expected `blend` or `direct`"),
        )),
    }
}

fn parse_aim_axis(value: &Value) -> Result<Vec3, ConfigError> {
    let parts = value
        .as_array()
        .filter(|a| a.len() == 3)
        .ok_or_else(|| invalid("binder.aim_axis", "expected an array of 3 numbers"))?;
    let mut xyz = [0.0f32; 3];
    for (slot, part) in xyz.iter_mut().zip(parts) {
        *slot = number(part).ok_or_else(|| invalid("binder.aim_axis", "expected numbers"))? as f32;
    }
    Vec3::from_array(xyz)
        .try_normalize()
        .ok_or_else(|| invalid("binder.aim_axis", "must not be zero"))
}

fn parse_context_settings(table: &toml::Table) -> Result<BTreeMap<String, AttrValue>, ConfigError> {
    table
        .iter()
        .map(|(key, value)| {
            let attr = match value {
                Value::Boolean(v) => AttrValue::Bool(*v),
                Value::Integer(v) => AttrValue::Int(*v),
                Value::Float(v) => AttrValue::Float(*v),
                Value::String(v) => AttrValue::Str(v.clone()),
                _ => {
                    return Err(ConfigError::InvalidField(
                        "dynamics.context",
                        format!("`{key}` must be a bool, number or string"),
                    ));
                }
            };
            Ok((key.clone(), attr))
        })
        .collect()
}

pub fn parse_rig_toml(contents: &str) -> Result<RigConfig, ConfigError> {
    let value: Value = contents.parse::<Value>()?;
    let root = value
        .as_table()
        .ok_or_else(|| invalid("<root>", "expected a table"))?;
    let mut config = RigConfig::default();

    config.prefix = string_field(root, "prefix", "prefix")?.map(str::to_string);
    if let Some(group) = string_field(root, "root_group", "root_group")? {
        config.root_group = group.to_string();
    }
    if let Some(suffix) = string_field(root, "work_suffix", "work_suffix")? {
        config.work_suffix = suffix.to_string();
    }
    if let Some(twist) = bool_field(root, "twist_reference", "twist_reference")? {
        config.twist_reference = twist;
    }
    if let Some(follow) = bool_field(root, "follow_parent", "follow_parent")? {
        config.follow_parent = follow;
    }

    if let Some(compositor) = table_field(root, "compositor", "compositor")? {
        config.strategy = parse_strategy(compositor)?;
    }

    if let Some(binder) = table_field(root, "binder", "binder")? {
        if let Some(offset) = bool_field(binder, "maintain_offset", "binder.maintain_offset")? {
            config.binder.maintain_offset = offset;
        }
        if let Some(axis) = binder.get("aim_axis") {
            config.binder.aim_axis = parse_aim_axis(axis)?;
        }
    }

    if let Some(dynamics) = table_field(root, "dynamics", "dynamics")? {
        if let Some(context) = table_field(dynamics, "context", "dynamics.context")? {
            config.context_settings = parse_context_settings(context)?;
        }
    }

    Ok(config)
}
