use serde::Deserialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Origin of a parameter value. A value set at a higher priority masks the
/// lower ones without erasing them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    ApplicationBuiltin,
    ConfigurationFile,
    UserFile,
    CommandLine,
    Interactive,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Double(_) => "double",
            ParamValue::String(_) => "string",
        }
    }

    /// Reads a command-line literal: booleans, then integers, then floats,
    /// anything else is kept as a string.
    pub fn parse_literal(text: &str) -> Self {
        let text = text.trim();
        match text {
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(v) = text.parse::<i64>() {
            return ParamValue::Int(v);
        }
        if let Ok(v) = text.parse::<f64>() {
            return ParamValue::Double(v);
        }
        ParamValue::String(text.trim_matches('"').to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Double(v) => write!(f, "{}", v),
            ParamValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Parameter '{0}' is not defined")]
    Missing(String),
    #[error("Parameter '{key}' holds a {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Parameter '{key}' = {value} is out of range ({reason})")]
    OutOfRange {
        key: String,
        value: i64,
        reason: &'static str,
    },
    #[error("Cannot parse assignment '{0}', expected key=value")]
    BadAssignment(String),
    #[error("No pushed priority left to pop")]
    EmptyPriorityStack,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Node {
    Value(ParamValue),
    Table(BTreeMap<String, Node>),
}

fn flatten(prefix: &str, table: BTreeMap<String, Node>, out: &mut Vec<(String, ParamValue)>) {
    for (name, node) in table {
        let key = if prefix.is_empty() {
            name
        } else {
            format!("{}.{}", prefix, name)
        };
        match node {
            Node::Value(v) => out.push((key, v)),
            Node::Table(t) => flatten(&key, t, out),
        }
    }
}

#[derive(Default)]
struct Parameter {
    values: BTreeMap<Priority, ParamValue>,
}

impl Parameter {
    fn effective(&self) -> Option<&ParamValue> {
        self.values.values().next_back()
    }
}

/// Values overwritten while a default priority was pushed, restored on pop.
struct Frame {
    priority: Priority,
    saved: Vec<(String, Option<ParamValue>)>,
}

#[derive(Default)]
struct Inner {
    params: BTreeMap<String, Parameter>,
    frames: Vec<Frame>,
}

/// Layered key/value parameter store.
///
/// Keys are dotted names (`conductor.maxPlaceIterations`). Writes that do not
/// name a priority land at the current default priority, which callers can
/// raise for a scope with [`ConfigStore::push_default_priority`]; dropping the
/// returned guard pops it and restores everything written under it.
#[derive(Default)]
pub struct ConfigStore {
    inner: RefCell<Inner>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(&self, path: &Path, priority: Priority) -> Result<usize, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let count = self.load_str(&text, priority)?;
        log::info!("Loaded {} parameters from {:?}", count, path);
        Ok(count)
    }

    pub fn load_str(&self, text: &str, priority: Priority) -> Result<usize, ConfigError> {
        let table: BTreeMap<String, Node> = toml::from_str(text)?;
        let mut entries = Vec::new();
        flatten("", table, &mut entries);
        let count = entries.len();
        for (key, value) in entries {
            self.set(&key, value, priority);
        }
        Ok(count)
    }

    /// Applies a `key=value` override, as given on the command line.
    pub fn apply_assignment(
        &self,
        assignment: &str,
        priority: Priority,
    ) -> Result<(), ConfigError> {
        let (key, value) = assignment
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::BadAssignment(assignment.to_string()))?;
        self.set(key.trim(), ParamValue::parse_literal(value), priority);
        Ok(())
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.inner.borrow().params.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.inner
            .borrow()
            .params
            .get(key)
            .and_then(|p| p.effective().cloned())
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        match self.get(key) {
            Some(ParamValue::Int(v)) => Ok(v),
            Some(other) => Err(mismatch(key, "int", &other)),
            None => Err(ConfigError::Missing(key.to_string())),
        }
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        if self.has_parameter(key) {
            self.get_int(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get(key) {
            Some(ParamValue::Bool(v)) => Ok(v),
            Some(other) => Err(mismatch(key, "bool", &other)),
            None => Err(ConfigError::Missing(key.to_string())),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        if self.has_parameter(key) {
            self.get_bool(key)
        } else {
            Ok(default)
        }
    }

    /// Integers are accepted where a double is expected.
    pub fn get_double(&self, key: &str) -> Result<f64, ConfigError> {
        match self.get(key) {
            Some(ParamValue::Double(v)) => Ok(v),
            Some(ParamValue::Int(v)) => Ok(v as f64),
            Some(other) => Err(mismatch(key, "double", &other)),
            None => Err(ConfigError::Missing(key.to_string())),
        }
    }

    pub fn get_double_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        if self.has_parameter(key) {
            self.get_double(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.get(key) {
            Some(ParamValue::String(v)) => Ok(v),
            Some(other) => Err(mismatch(key, "string", &other)),
            None => Ok(default.to_string()),
        }
    }

    pub fn set_int(&self, key: &str, value: i64) {
        self.set(key, ParamValue::Int(value), self.default_priority());
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.set(key, ParamValue::Bool(value), self.default_priority());
    }

    pub fn set_double(&self, key: &str, value: f64) {
        self.set(key, ParamValue::Double(value), self.default_priority());
    }

    /// Writes `value` at `priority`, creating the parameter if needed.
    pub fn set(&self, key: &str, value: ParamValue, priority: Priority) {
        let mut inner = self.inner.borrow_mut();
        let previous = inner
            .params
            .get(key)
            .and_then(|p| p.values.get(&priority).cloned());

        if let Some(frame) = inner.frames.last_mut()
            && frame.priority == priority
            && !frame.saved.iter().any(|(k, _)| k == key)
        {
            frame.saved.push((key.to_string(), previous));
        }

        log::trace!("cfg {} = {} ({:?})", key, value, priority);
        inner
            .params
            .entry(key.to_string())
            .or_default()
            .values
            .insert(priority, value);
    }

    pub fn default_priority(&self) -> Priority {
        self.inner
            .borrow()
            .frames
            .last()
            .map(|f| f.priority)
            .unwrap_or(Priority::ApplicationBuiltin)
    }

    pub fn priority_depth(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    /// Raises the default write priority until the guard is dropped.
    #[must_use = "the priority is popped as soon as the guard is dropped"]
    pub fn push_default_priority(&self, priority: Priority) -> PriorityGuard<'_> {
        let mut inner = self.inner.borrow_mut();
        inner.frames.push(Frame {
            priority,
            saved: Vec::new(),
        });
        log::debug!(
            "Pushed default priority {:?} (depth {})",
            priority,
            inner.frames.len()
        );
        PriorityGuard { store: self }
    }

    /// Pops the innermost pushed priority and undoes the writes made under it.
    pub fn pop_default_priority(&self) -> Result<Priority, ConfigError> {
        let mut inner = self.inner.borrow_mut();
        let frame = inner.frames.pop().ok_or(ConfigError::EmptyPriorityStack)?;

        for (key, previous) in frame.saved.into_iter().rev() {
            match previous {
                Some(value) => {
                    inner
                        .params
                        .entry(key)
                        .or_default()
                        .values
                        .insert(frame.priority, value);
                }
                None => {
                    let now_empty = match inner.params.get_mut(&key) {
                        Some(param) => {
                            param.values.remove(&frame.priority);
                            param.values.is_empty()
                        }
                        None => false,
                    };
                    if now_empty {
                        inner.params.remove(&key);
                    }
                }
            }
        }
        log::debug!(
            "Popped default priority {:?} (depth {})",
            frame.priority,
            inner.frames.len()
        );
        Ok(frame.priority)
    }
}

fn mismatch(key: &str, expected: &'static str, found: &ParamValue) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Scope of a pushed default priority.
pub struct PriorityGuard<'a> {
    store: &'a ConfigStore,
}

impl Drop for PriorityGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.pop_default_priority() {
            log::error!("Configuration priority stack out of balance: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [conductor]
        maxPlaceIterations = 3
        useFixedAbHeight = true

        [anabatic]
        globalIterations = 12
        gcellSize = 2.5

        [katana.trace]
        label = "debug"
    "#;

    #[test]
    fn nested_tables_flatten_to_dotted_keys() {
        let store = ConfigStore::new();
        let count = store.load_str(SAMPLE, Priority::ConfigurationFile).unwrap();

        assert_eq!(count, 5);
        assert_eq!(store.get_int("conductor.maxPlaceIterations").unwrap(), 3);
        assert!(store.get_bool("conductor.useFixedAbHeight").unwrap());
        assert_eq!(store.get_double("anabatic.gcellSize").unwrap(), 2.5);
        assert_eq!(store.get_double("anabatic.globalIterations").unwrap(), 12.0);
        assert_eq!(store.get_string_or("katana.trace.label", "").unwrap(), "debug");
    }

    #[test]
    fn absent_keys_fall_back_but_wrong_types_fail() {
        let store = ConfigStore::new();
        store.load_str(SAMPLE, Priority::ConfigurationFile).unwrap();

        assert_eq!(store.get_int_or("conductor.stopLevel", 1).unwrap(), 1);
        assert!(matches!(
            store.get_int_or("conductor.useFixedAbHeight", 0),
            Err(ConfigError::TypeMismatch { found: "bool", .. })
        ));
        assert!(matches!(
            store.get_int("missing.key"),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn higher_priority_masks_lower() {
        let store = ConfigStore::new();
        store.set("anabatic.globalIterations", ParamValue::Int(10), Priority::UserFile);
        store.set(
            "anabatic.globalIterations",
            ParamValue::Int(4),
            Priority::ApplicationBuiltin,
        );
        assert_eq!(store.get_int("anabatic.globalIterations").unwrap(), 10);

        store
            .apply_assignment("anabatic.globalIterations=20", Priority::CommandLine)
            .unwrap();
        assert_eq!(store.get_int("anabatic.globalIterations").unwrap(), 20);
    }

    #[test]
    fn dropping_the_guard_restores_persisted_values() {
        let store = ConfigStore::new();
        store.set("anabatic.globalIterations", ParamValue::Int(10), Priority::ConfigurationFile);

        {
            let _guard = store.push_default_priority(Priority::Interactive);
            assert_eq!(store.default_priority(), Priority::Interactive);
            store.set_int("anabatic.globalIterations", 7);
            store.set_int("anabatic.globalIterations", 9);
            store.set_bool("conductor.scratch", true);
            store.set_double("etesian.spaceMargin", 0.3);
            assert_eq!(store.get_int("anabatic.globalIterations").unwrap(), 9);
            assert_eq!(store.get_double("etesian.spaceMargin").unwrap(), 0.3);
            assert_eq!(store.priority_depth(), 1);
        }

        assert_eq!(store.priority_depth(), 0);
        assert_eq!(store.get_int("anabatic.globalIterations").unwrap(), 10);
        assert!(!store.has_parameter("conductor.scratch"));
        assert!(!store.has_parameter("etesian.spaceMargin"));
        assert_eq!(store.default_priority(), Priority::ApplicationBuiltin);
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let store = ConfigStore::new();
        let outer = store.push_default_priority(Priority::CommandLine);
        store.set_int("a", 1);
        {
            let _inner = store.push_default_priority(Priority::Interactive);
            store.set_int("a", 2);
            assert_eq!(store.get_int("a").unwrap(), 2);
        }
        assert_eq!(store.get_int("a").unwrap(), 1);
        drop(outer);
        assert!(!store.has_parameter("a"));
        assert!(matches!(
            store.pop_default_priority(),
            Err(ConfigError::EmptyPriorityStack)
        ));
    }

    #[test]
    fn assignment_literals_are_typed() {
        assert_eq!(ParamValue::parse_literal("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse_literal(" 42 "), ParamValue::Int(42));
        assert_eq!(ParamValue::parse_literal("0.5"), ParamValue::Double(0.5));
        assert_eq!(
            ParamValue::parse_literal("\"M2\""),
            ParamValue::String("M2".to_string())
        );

        let store = ConfigStore::new();
        assert!(matches!(
            store.apply_assignment("=3", Priority::CommandLine),
            Err(ConfigError::BadAssignment(_))
        ));
    }
}
