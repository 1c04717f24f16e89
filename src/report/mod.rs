//! Test-case records as delivered by the Allure report service.
//!
//! Every field is optional and decoded on its own: a field of the wrong
//! JSON type reads as absent and a malformed list element is dropped, so a
//! single odd case never rejects the whole report. Only a body that is not
//! JSON at all, or JSON of the wrong overall shape, fails [`parse_report`].

mod aggregate;
mod format;
mod team;
mod timestamp;

pub use aggregate::aggregate;
pub use format::{format_summary, format_summary_with, Captions, LINE_BREAK};
pub use team::extract_team_name;
pub use timestamp::{format_date, normalize_timestamp};

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::insights::Status;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestCase {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub labels: Vec<Label>,
    #[serde(deserialize_with = "lenient")]
    pub time: Option<CaseTime>,
    #[serde(deserialize_with = "lenient")]
    pub timestamp: Option<f64>,
    #[serde(deserialize_with = "lenient_list")]
    pub links: Vec<Link>,
    #[serde(deserialize_with = "lenient")]
    pub jira: Option<JiraField>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaseTime {
    #[serde(deserialize_with = "lenient")]
    pub start: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Label {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Link {
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub url: Option<String>,
}

/// The free-form `jira` field: either one reference or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum JiraField {
    Single(String),
    Many(Vec<JiraRef>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JiraRef {
    Key(String),
    Object {
        url: Option<Value>,
        id: Option<Value>,
        name: Option<Value>,
    },
}

impl<'de> Deserialize<'de> for JiraField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(key) => Ok(Self::Single(key)),
            Value::Array(items) => Ok(Self::Many(
                items.into_iter().filter_map(JiraRef::from_value).collect(),
            )),
            other => Err(de::Error::custom(format!(
                "unsupported jira field: {other}"
            ))),
        }
    }
}

impl JiraRef {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(key) => Some(Self::Key(key)),
            Value::Object(mut fields) => Some(Self::Object {
                url: fields.remove("url"),
                id: fields.remove("id"),
                name: fields.remove("name"),
            }),
            _ => None,
        }
    }

    /// `url`, else `id`, else `name`: the first one that is set. Empty
    /// keys carry no reference.
    pub fn reference(&self) -> Option<String> {
        match self {
            Self::Key(key) => Some(key.clone()).filter(|k| !k.is_empty()),
            Self::Object { url, id, name } => [url, id, name]
                .into_iter()
                .find_map(|field| field.as_ref().and_then(scalar_to_string)),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

impl Label {
    /// The label's value when it carries `name` and a non-empty value.
    pub fn value_for(&self, name: &str) -> Option<&str> {
        if self.name.as_deref() != Some(name) {
            return None;
        }
        self.value.as_deref().filter(|v| !v.is_empty())
    }
}

impl Link {
    fn is_defect(&self) -> bool {
        self.kind
            .as_deref()
            .filter(|k| !k.is_empty())
            .or(self.name.as_deref())
            .is_some_and(|k| k.to_lowercase().contains("jira"))
    }
}

impl TestCase {
    /// `time.start`, falling back to `timestamp`.
    pub fn start_time(&self) -> Option<f64> {
        self.time
            .as_ref()
            .and_then(|t| t.start)
            .or(self.timestamp)
    }

    pub fn recognized_status(&self) -> Option<Status> {
        self.status.as_deref().and_then(Status::parse)
    }

    pub fn label_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.labels.iter().filter_map(move |l| l.value_for(name))
    }

    /// Defect references from `links` and from the top-level `jira` field.
    pub fn defect_links(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .links
            .iter()
            .filter(|link| link.is_defect())
            .filter_map(|link| link.url.clone().filter(|u| !u.is_empty()))
            .collect();

        match &self.jira {
            Some(JiraField::Single(key)) if !key.is_empty() => refs.push(key.clone()),
            Some(JiraField::Many(items)) => {
                refs.extend(items.iter().filter_map(JiraRef::reference))
            }
            _ => {}
        }

        refs
    }
}

/// Parse a raw report body into test cases.
///
/// Accepts a bare JSON array or a paged object with the array under
/// `content`. Elements that are not objects are skipped.
pub fn parse_report(body: &str) -> Result<Vec<TestCase>, serde_json::Error> {
    let items = match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => items,
        Value::Object(mut page) => match page.remove("content") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(de::Error::custom(
                    "expected a list of test cases under \"content\"",
                ))
            }
        },
        _ => return Err(de::Error::custom("expected a list of test cases")),
    };

    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}
