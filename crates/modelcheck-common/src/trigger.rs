use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Image reference for vision task inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImageInput {
    #[serde(rename = "image_url")]
    Url(String),
    #[serde(rename = "image_base64")]
    Base64(String),
}

/// One entry of `task_inputs`, keyed by task kind (`classification`, `detection`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput(pub Map<String, Value>);

impl TaskInput {
    pub fn new(task: &str, payload: Value) -> Self {
        let mut map = Map::new();
        map.insert(task.to_string(), payload);
        Self(map)
    }

    pub fn classification(image: ImageInput) -> Self {
        let payload = match image {
            ImageInput::Url(url) => serde_json::json!({ "image_url": url }),
            ImageInput::Base64(b64) => serde_json::json!({ "image_base64": b64 }),
        };
        Self::new("classification", payload)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub task_inputs: Vec<TaskInput>,
}

impl TriggerRequest {
    pub fn classification(images: impl IntoIterator<Item = ImageInput>) -> Self {
        Self {
            task_inputs: images.into_iter().map(TaskInput::classification).collect(),
        }
    }
}

/// One entry of `task_outputs`; shape depends on the model's task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput(pub Map<String, Value>);

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Option<String>,
    pub score: Option<f64>,
}

impl TaskOutput {
    pub fn get(&self, task: &str) -> Option<&Value> {
        self.0.get(task)
    }

    pub fn classification(&self) -> Option<Classification> {
        let c = self.get("classification")?;
        Some(Classification {
            category: c.get("category").and_then(|v| v.as_str()).map(str::to_string),
            score: c.get("score").and_then(|v| v.as_f64()),
        })
    }

    /// Sorted `task.field` paths present in this output, used to compare the
    /// shape of repeated trigger results.
    pub fn shape(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (task, payload) in &self.0 {
            match payload.as_object() {
                Some(fields) => {
                    for key in fields.keys() {
                        out.push(format!("{task}.{key}"));
                    }
                }
                None => out.push(task.clone()),
            }
        }
        out.sort();
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default, alias = "taskOutputs")]
    pub task_outputs: Vec<TaskOutput>,
}

impl TriggerResponse {
    pub fn shape(&self) -> Vec<Vec<String>> {
        self.task_outputs.iter().map(TaskOutput::shape).collect()
    }
}

/// A file sent to `.../trigger-multipart`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_request_wire_shape() {
        let req = TriggerRequest::classification([
            ImageInput::Url("https://artifacts.instill.tech/imgs/dog.jpg".to_string()),
            ImageInput::Base64("aGk=".to_string()),
        ]);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v["task_inputs"][0]["classification"]["image_url"],
            "https://artifacts.instill.tech/imgs/dog.jpg"
        );
        assert_eq!(v["task_inputs"][1]["classification"]["image_base64"], "aGk=");
    }

    #[test]
    fn test_classification_output() {
        let resp: TriggerResponse = serde_json::from_value(serde_json::json!({
            "task": "TASK_CLASSIFICATION",
            "task_outputs": [{"classification": {"category": "match", "score": 1}}]
        }))
        .unwrap();
        let c = resp.task_outputs[0].classification().unwrap();
        assert_eq!(c.category.as_deref(), Some("match"));
        assert_eq!(c.score, Some(1.0));
        assert_eq!(resp.shape(), vec![vec![
            "classification.category".to_string(),
            "classification.score".to_string()
        ]]);
    }
}
