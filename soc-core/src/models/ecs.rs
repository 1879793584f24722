use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ECS_VERSION: &str = "8.11";

/// Wire form of a `ParsedEvent`, keyed under nested ECS paths. Built by
/// `crate::normalize`; carries a deterministic `_id` so replay never
/// double-indexes the same source record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcsDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EcsDocument {
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut cur = self.fields.get(path.split('.').next()?)?;
        let mut parts = path.split('.');
        parts.next();
        for part in parts {
            cur = cur.as_object()?.get(part)?;
        }
        Some(cur)
    }
}
