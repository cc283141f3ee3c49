use serde::{Deserialize, Deserializer, Serialize};

/// The only runtime status that ends polling.
pub const COMPLETED: &str = "Completed";

/// Status record of a durable orchestration instance.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct DurableInstance<T> {
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub runtime_status: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub output: Vec<T>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_updated_time: Option<String>,
}

impl<T> DurableInstance<T> {
    pub fn is_completed(&self) -> bool {
        self.runtime_status == COMPLETED
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
