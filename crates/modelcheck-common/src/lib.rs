pub mod auth;
pub mod definition;
pub mod model;
pub mod names;
pub mod operation;
pub mod telemetry;
pub mod trigger;
pub mod validate;
mod wire;

pub use auth::AuthMode;
pub use definition::{ListModelDefinitionsResponse, ModelDefinition, ModelDefinitionResponse};
pub use model::*;
pub use names::{check_canonical_name, check_canonical_version_name, ModelName, NameError, VersionName};
pub use operation::{Operation, OperationError, OperationResponse};
pub use trigger::{
    Classification, FilePart, ImageInput, TaskInput, TaskOutput, TriggerRequest, TriggerResponse,
};
