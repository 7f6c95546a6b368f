use crate::error::Hitem3dError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// The smallest face count accepted by the service.
pub const MIN_FACE_COUNT: u32 = 100_000;
/// The largest face count accepted by the service.
pub const MAX_FACE_COUNT: u32 = 2_000_000;

/// Declares a string-coded enum with `FromStr`, `Display` and `as_str`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $param:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All values, in wire order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The string sent to the API for this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Hitem3dError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(Hitem3dError::InvalidParameter {
                        name: $param,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// What the service should generate.
    RequestType, "request_type" {
        /// Geometry only.
        GeometryOnly => "1",
        /// Geometry first, texture in a second stage.
        StagedTexture => "2",
        /// Geometry and texture in one pass.
        GeometryAndTexture => "3",
    }
}

wire_enum! {
    /// Reconstruction resolution.
    Resolution, "resolution" {
        R512 => "512",
        R1024 => "1024",
        R1536 => "1536",
        R1536Pro => "1536pro",
    }
}

wire_enum! {
    /// Reconstruction model version.
    ModelVersion, "model" {
        Hitem3dV15 => "hitem3dv1.5",
        Hitem3dV20 => "hitem3dv2.0",
        ScenePortraitV15 => "scene-portraitv1.5",
        ScenePortraitV20 => "scene-portraitv2.0",
    }
}

wire_enum! {
    /// File format of the generated model.
    OutputFormat, "format" {
        Obj => "1",
        Glb => "2",
        Stl => "3",
        Fbx => "4",
        Usdz => "5",
    }
}

impl OutputFormat {
    /// The file extension of the downloaded artifact.
    pub fn extension(&self) -> &'static str {
        extension_for_format_code(self.as_str())
    }
}

/// Maps a format code to a file extension, falling back to `glb` for unknown codes.
pub fn extension_for_format_code(code: &str) -> &'static str {
    match code.trim() {
        "1" => "obj",
        "2" => "glb",
        "3" => "stl",
        "4" => "fbx",
        "5" => "usdz",
        _ => "glb",
    }
}

/// Parameters of a multi-view reconstruction task.
///
/// Only type and range checks are applied. Whether a given combination of
/// model, resolution and request type is supported is left to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskParameters {
    pub request_type: RequestType,
    pub resolution: Resolution,
    /// Target face count, within [`MIN_FACE_COUNT`, `MAX_FACE_COUNT`].
    pub face: u32,
    pub model: ModelVersion,
    pub format: OutputFormat,
}

impl Default for TaskParameters {
    fn default() -> Self {
        Self {
            request_type: RequestType::GeometryOnly,
            resolution: Resolution::R512,
            face: 1_000_000,
            model: ModelVersion::Hitem3dV15,
            format: OutputFormat::Glb,
        }
    }
}

impl TaskParameters {
    /// Builds parameters from their raw wire strings.
    ///
    /// # Errors
    ///
    /// `Hitem3dError::InvalidParameter` naming the first field that does not parse
    /// or whose value is out of range.
    pub fn parse(
        request_type: &str,
        resolution: &str,
        face: &str,
        model: &str,
        format: &str,
    ) -> Result<Self, Hitem3dError> {
        let face_count = face
            .trim()
            .parse::<u32>()
            .map_err(|_| Hitem3dError::InvalidParameter {
                name: "face",
                value: face.to_string(),
            })?;

        let params = Self {
            request_type: request_type.parse()?,
            resolution: resolution.parse()?,
            face: face_count,
            model: model.parse()?,
            format: format.parse()?,
        };
        params.validate()?;
        Ok(params)
    }

    /// Checks the face count range.
    pub fn validate(&self) -> Result<(), Hitem3dError> {
        if !(MIN_FACE_COUNT..=MAX_FACE_COUNT).contains(&self.face) {
            return Err(Hitem3dError::InvalidParameter {
                name: "face",
                value: self.face.to_string(),
            });
        }
        Ok(())
    }

    /// The multipart text fields, in the order the API documents them.
    pub fn form_fields(&self) -> [(&'static str, String); 5] {
        [
            ("request_type", self.request_type.to_string()),
            ("resolution", self.resolution.to_string()),
            ("face", self.face.to_string()),
            ("model", self.model.to_string()),
            ("format", self.format.to_string()),
        ]
    }
}

/// Represents the lifecycle state of a reconstruction task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TaskState {
    /// The task has been accepted but not yet scheduled.
    Created,
    /// The task is waiting for a worker.
    Queueing,
    /// The task is actively being processed.
    Processing,
    /// The task completed and a model URL is available.
    Success,
    /// The service rejected or failed to process the input.
    Failed,
    /// A state string this client does not understand.
    Unknown(String),
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => TaskState::Created,
            "queueing" => TaskState::Queueing,
            "processing" => TaskState::Processing,
            "success" => TaskState::Success,
            "failed" => TaskState::Failed,
            _ => TaskState::Unknown(s),
        }
    }
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Created => "created",
            TaskState::Queueing => "queueing",
            TaskState::Processing => "processing",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::Unknown(raw) => raw,
        }
    }

    /// Whether no further transitions will happen.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TaskState::Created | TaskState::Queueing | TaskState::Processing
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of a task as reported by `query-task`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    /// The current lifecycle state of the task.
    #[serde(default = "unknown_state")]
    pub state: TaskState,
    /// The model download URL, present once the task succeeded.
    #[serde(default)]
    pub url: Option<String>,
}

fn unknown_state() -> TaskState {
    TaskState::Unknown(String::new())
}

/// (Internal) Payload of a successful token exchange.
#[derive(Deserialize, Debug)]
pub(crate) struct TokenData {
    #[serde(rename = "accessToken")]
    pub(crate) access_token: String,
}

/// (Internal) Payload of a successful task submission.
#[derive(Deserialize, Debug)]
pub(crate) struct SubmitData {
    pub(crate) task_id: String,
}

/// (Internal) The `{code, data}` envelope used by the auth and submit endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct CodedResponse<T> {
    #[serde(default)]
    pub(crate) code: Option<i64>,
    #[serde(default = "Option::default")]
    pub(crate) data: Option<T>,
}

impl<T> CodedResponse<T> {
    /// Returns the payload only when the envelope reports `code == 200`.
    pub(crate) fn into_success(self) -> Option<T> {
        match self.code {
            Some(200) => self.data,
            _ => None,
        }
    }
}

/// (Internal) A generic wrapper for API responses where the content is nested under a "data" field.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) data: T,
}
