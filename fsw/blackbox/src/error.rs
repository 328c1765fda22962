use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Euler(#[from] EulerError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    #[error("io {0}")]
    Stream(#[from] io::Error),
}

impl Error {
    /// Attaches `path` to a bare stream error so it reports as
    /// [`IoError::ReadFailed`].
    pub fn reading(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Error::Stream(source) => IoError::ReadFailed {
                path: path.into(),
                source,
            }
            .into(),
            err => err,
        }
    }
}

/// Failures while turning one header line into a [`crate::SensorDescriptor`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum SchemaError {
    #[error("the sensor data definition of sensor '{sensor}' is corrupted")]
    #[diagnostic(
        code(blackbox::schema::malformed),
        help("a sensor line needs a name, an id and at least one field: name;id;label,unit,type")
    )]
    MalformedSensorSpec { sensor: String },

    #[error("the sensor data definition of sensor '{sensor}' has an invalid ID '{id}'")]
    #[diagnostic(
        code(blackbox::schema::invalid_id),
        help("sensor ids are integers in the range 0..=255")
    )]
    InvalidSensorId { sensor: String, id: String },

    #[error("the sensor data definition of sensor '{sensor}' has an invalid data specification '{field}'")]
    #[diagnostic(
        code(blackbox::schema::invalid_field),
        help("every field is written as label,unit,type")
    )]
    InvalidFieldSpec { sensor: String, field: String },

    #[error("the sensor data definition of sensor '{sensor}' has an unsupported data type '{type_name}'")]
    #[diagnostic(code(blackbox::schema::unsupported_type))]
    UnsupportedType { sensor: String, type_name: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum HeaderError {
    #[error("file has no header")]
    #[diagnostic(
        code(blackbox::header::not_found),
        help("the schema must be enclosed by a HEADER line and an ENDHEADER line")
    )]
    NoHeaderFound,

    #[error("header has no defined end")]
    #[diagnostic(code(blackbox::header::unterminated))]
    UnterminatedHeader,

    #[error("file has no content in its header")]
    #[diagnostic(code(blackbox::header::empty))]
    EmptyHeader,
}

#[derive(Error, Debug, Diagnostic)]
pub enum IoError {
    #[error("the specified file '{}' does not exist", path.display())]
    #[diagnostic(code(blackbox::io::not_found))]
    FileNotFound { path: PathBuf },

    #[error("cannot open file '{}': {source}", path.display())]
    #[diagnostic(code(blackbox::io::open))]
    OpenFailed { path: PathBuf, source: io::Error },

    #[error("cannot create output file '{}': {source}", path.display())]
    #[diagnostic(code(blackbox::io::create))]
    CreateFailed { path: PathBuf, source: io::Error },

    #[error("failed reading '{}': {source}", path.display())]
    #[diagnostic(code(blackbox::io::read))]
    ReadFailed { path: PathBuf, source: io::Error },

    #[error("failed writing '{}': {source}", path.display())]
    #[diagnostic(code(blackbox::io::write))]
    WriteFailed { path: PathBuf, source: io::Error },

    #[error("cannot remove intermediate file '{}': {source}", path.display())]
    #[diagnostic(code(blackbox::io::remove))]
    RemoveFailed { path: PathBuf, source: io::Error },
}

impl IoError {
    /// Maps a failed `File::open` onto `FileNotFound` or `OpenFailed`.
    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            IoError::FileNotFound { path }
        } else {
            IoError::OpenFailed { path, source }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum EulerError {
    #[error("IMU data is declared but no '{label}' column was found")]
    #[diagnostic(
        code(blackbox::euler::missing_quat_pos),
        help("the Euler pass needs the quaternion labelled q1 [NED] in the second header row")
    )]
    MissingQuatPos { label: String },

    #[error("quaternion starting at column {quat_pos} has fewer than four columns")]
    #[diagnostic(code(blackbox::euler::incomplete_quaternion))]
    IncompleteQuaternion { quat_pos: usize },

    #[error("row {row} has an invalid quaternion component '{value}'")]
    #[diagnostic(code(blackbox::euler::invalid_quaternion))]
    InvalidQuaternion { row: usize, value: String },
}

#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    #[diagnostic(code(blackbox::config::read))]
    Read { path: PathBuf, source: io::Error },

    #[error("toml parsing failed")]
    #[diagnostic(code(blackbox::config::parse))]
    Parse(#[from] toml::de::Error),

    #[error("invalid separator {0:?}")]
    #[diagnostic(
        code(blackbox::config::separator),
        help("the separator must be a single ASCII character other than a quote or line break")
    )]
    InvalidSeparator(char),
}
