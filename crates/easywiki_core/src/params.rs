use std::collections::BTreeMap;

/// A single API parameter value.
///
/// `Absent` is kept in the map (so it still blocks a default from being merged
/// in) but never reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Absent,
}

impl ParamValue {
    /// Wire form of the value, or `None` when the key must be omitted.
    /// MediaWiki treats any present boolean parameter as true, so `false`
    /// is expressed by leaving the key out.
    pub fn encode(&self) -> Option<String> {
        match self {
            Self::Text(value) => Some(value.clone()),
            Self::Int(value) => Some(value.to_string()),
            Self::Bool(true) => Some("1".to_string()),
            Self::Bool(false) | Self::Absent => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Text(value.to_string()))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Absent)
    }
}

/// Parameter map for one API call, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: BTreeMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert that overwrites any existing value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Add every default whose key is not already present. Keys the caller
    /// set, including those set to `Absent`, are left untouched.
    pub fn merge_defaults(&mut self, defaults: Params) {
        for (key, value) in defaults.entries {
            self.entries.entry(key).or_insert(value);
        }
    }

    /// Owned variant of [`Params::merge_defaults`].
    pub fn with_defaults(mut self, defaults: Params) -> Self {
        self.merge_defaults(defaults);
        self
    }

    /// Key/value pairs ready for URL or form encoding; absent entries are
    /// dropped.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.encode().map(|encoded| (key.clone(), encoded)))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

/// A page addressed either by title or by numeric page id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    Title(String),
    Id(u64),
}

impl PageRef {
    /// Parameters addressing this page through `title_key` or `id_key`. The
    /// unused key is set to `Absent` so a later default cannot fill it in.
    pub fn project(&self, title_key: &str, id_key: &str) -> Params {
        match self {
            Self::Title(title) => Params::new()
                .with(title_key, title.as_str())
                .with(id_key, ParamValue::Absent),
            Self::Id(id) => Params::new()
                .with(title_key, ParamValue::Absent)
                .with(id_key, *id),
        }
    }
}

impl From<&str> for PageRef {
    fn from(value: &str) -> Self {
        Self::Title(value.to_string())
    }
}

impl From<String> for PageRef {
    fn from(value: String) -> Self {
        Self::Title(value)
    }
}

impl From<u64> for PageRef {
    fn from(value: u64) -> Self {
        Self::Id(value)
    }
}

impl From<u32> for PageRef {
    fn from(value: u32) -> Self {
        Self::Id(u64::from(value))
    }
}
