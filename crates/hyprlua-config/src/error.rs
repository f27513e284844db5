use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(hyprlua::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid value for `{key}`: {message}")]
    #[diagnostic(code(hyprlua::config::invalid_value))]
    InvalidValue {
        key: String,
        message: String,
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(hyprlua::config::invalid))]
    Invalid { message: String },

    #[error("HYPRLAND_INSTANCE_SIGNATURE not set - is Hyprland running?")]
    #[diagnostic(
        code(hyprlua::config::no_instance),
        help("set `socket` in the settings file or pass --socket")
    )]
    InstanceNotSet,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
