//! Parameter document loading and validation.
//!
//! Loads the flat key/value JSON document, rejects missing or malformed
//! required parameters before any resource is touched, and fills the
//! optional set with fixed or derived defaults.

use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ParamsError, Result, SkyliftError};

use super::context::{ParamContext, ParamValue};
use super::names;

/// Parameters that must be present, non-null, and non-empty.
pub const REQUIRED_PARAMS: &[&str] = &[
    names::LOCATION,
    names::RESOURCE_GROUP,
    names::SUBSCRIPTION_ID,
    names::TENANT_ID,
    names::CLIENT_ID,
    names::CLIENT_SECRET,
];

/// Environment variable that may stand in for `client_secret`.
pub const CLIENT_SECRET_ENV: &str = "SKYLIFT_CLIENT_SECRET";

/// An optional parameter and the rule that synthesizes its value.
#[derive(Debug, Clone, Copy)]
pub struct OptionalParam {
    /// Parameter name.
    pub name: &'static str,
    /// Default rule applied when the document omits the parameter.
    pub default: DefaultRule,
}

/// How an absent optional parameter is filled in.
#[derive(Debug, Clone, Copy)]
pub enum DefaultRule {
    /// A literal string default.
    Str(&'static str),
    /// A literal integer default.
    Int(i64),
    /// A literal boolean default.
    Bool(bool),
    /// Registry name derived from the resource group.
    RegistryName,
    /// Storage endpoint suffix derived from the cloud flavor.
    EndpointSuffix,
}

/// Optional parameters in resolution order. Derived rules appear after
/// the parameters they read.
pub const OPTIONAL_PARAMS: &[OptionalParam] = &[
    OptionalParam {
        name: names::CLOUD,
        default: DefaultRule::Str("public"),
    },
    OptionalParam {
        name: names::GATEWAY_TIER,
        default: DefaultRule::Str("Developer"),
    },
    OptionalParam {
        name: names::GATEWAY_CAPACITY,
        default: DefaultRule::Int(1),
    },
    OptionalParam {
        name: names::REGISTRY_NAME,
        default: DefaultRule::RegistryName,
    },
    OptionalParam {
        name: names::ENDPOINT_SUFFIX,
        default: DefaultRule::EndpointSuffix,
    },
    OptionalParam {
        name: names::TELEMETRY_SINKS,
        default: DefaultRule::Str("console"),
    },
    OptionalParam {
        name: names::IMAGE_NAME,
        default: DefaultRule::Str("skylift/rag-api"),
    },
    OptionalParam {
        name: names::IMAGE_TAG,
        default: DefaultRule::Str("latest"),
    },
    OptionalParam {
        name: names::NAMESPACE,
        default: DefaultRule::Str("skylift"),
    },
    OptionalParam {
        name: names::CHART_PATH,
        default: DefaultRule::Str("charts/rag-api"),
    },
    OptionalParam {
        name: names::OPERATOR_OBJECT_ID,
        default: DefaultRule::Str(""),
    },
    OptionalParam {
        name: names::DEBUG,
        default: DefaultRule::Bool(false),
    },
];

/// Loader for the parameters document.
#[derive(Debug, Default)]
pub struct ParamLoader {
    /// Base path for resolving the `.env` overlay.
    base_path: Option<std::path::PathBuf>,
}

impl ParamLoader {
    /// Creates a new parameter loader.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` overlay.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the `.env` file next to the parameters document, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                SkyliftError::Params(ParamsError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Loads and fully resolves a parameters file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparsable, or fails
    /// required-parameter validation.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ParamContext> {
        let path = path.as_ref();
        info!("Loading parameters from: {}", path.display());

        if !path.exists() {
            return Err(SkyliftError::Params(ParamsError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SkyliftError::Params(ParamsError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_json(&content, Some(path))
    }

    /// Parses and fully resolves a parameters document from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid, a value has an unsupported
    /// type, or a required parameter is absent, null, or empty.
    pub fn parse_json(&self, content: &str, source: Option<&Path>) -> Result<ParamContext> {
        debug!("Parsing parameters document");

        let doc: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            SkyliftError::Params(ParamsError::ParseError {
                message: format!("JSON parse error: {e}"),
                location,
            })
        })?;

        let Some(object) = doc.as_object() else {
            return Err(SkyliftError::Params(ParamsError::ParseError {
                message: String::from("Parameters document must be a flat JSON object"),
                location: source.map(|p| p.display().to_string()),
            }));
        };

        let mut values: IndexMap<String, ParamValue> = IndexMap::new();
        for (name, value) in object {
            match value {
                serde_json::Value::Null => {
                    // Null is indistinguishable from absent for validation.
                    debug!("Parameter '{name}' is null, treating as absent");
                }
                serde_json::Value::Bool(b) => {
                    values.insert(name.clone(), ParamValue::Bool(*b));
                }
                serde_json::Value::Number(n) => {
                    let Some(i) = n.as_i64() else {
                        return Err(SkyliftError::Params(ParamsError::UnsupportedType {
                            name: name.clone(),
                            found: format!("non-integer number ({n})"),
                        }));
                    };
                    values.insert(name.clone(), ParamValue::Int(i));
                }
                serde_json::Value::String(s) => {
                    values.insert(name.clone(), ParamValue::Str(s.clone()));
                }
                serde_json::Value::Array(_) => {
                    return Err(SkyliftError::Params(ParamsError::UnsupportedType {
                        name: name.clone(),
                        found: String::from("array"),
                    }));
                }
                serde_json::Value::Object(_) => {
                    return Err(SkyliftError::Params(ParamsError::UnsupportedType {
                        name: name.clone(),
                        found: String::from("object"),
                    }));
                }
            }
        }

        Self::resolve(values)
    }

    /// Validates the required set and applies optional defaults.
    ///
    /// Validation either fully succeeds or aborts the run; no resource is
    /// touched before this returns.
    fn resolve(mut values: IndexMap<String, ParamValue>) -> Result<ParamContext> {
        Self::validate_required(&mut values)?;
        Self::apply_defaults(&mut values)?;

        let mut context = ParamContext::new();
        for (name, value) in values {
            context.insert(name, value);
        }

        debug!("Resolved {} parameters", context.len());
        Ok(context)
    }

    /// Checks that every required parameter is present and usable.
    fn validate_required(values: &mut IndexMap<String, ParamValue>) -> Result<()> {
        for name in REQUIRED_PARAMS {
            let present = match values.get(*name) {
                Some(ParamValue::Str(s)) => !s.is_empty(),
                Some(_) => {
                    return Err(SkyliftError::Params(ParamsError::WrongType {
                        name: (*name).to_string(),
                        expected: "string",
                    }));
                }
                None => false,
            };

            if present {
                continue;
            }

            // The client secret may arrive via the environment instead of
            // the document; every other required key must be in the file.
            if *name == names::CLIENT_SECRET
                && let Ok(secret) = std::env::var(CLIENT_SECRET_ENV)
                && !secret.is_empty()
            {
                debug!("Using client secret from {CLIENT_SECRET_ENV}");
                values.insert((*name).to_string(), ParamValue::Str(secret));
                continue;
            }

            return Err(SkyliftError::Params(ParamsError::missing(*name)));
        }

        Ok(())
    }

    /// Fills absent optional parameters with their documented defaults.
    fn apply_defaults(values: &mut IndexMap<String, ParamValue>) -> Result<()> {
        for optional in OPTIONAL_PARAMS {
            if values.contains_key(optional.name) {
                continue;
            }

            let value = match optional.default {
                DefaultRule::Str(s) => ParamValue::Str(s.to_string()),
                DefaultRule::Int(i) => ParamValue::Int(i),
                DefaultRule::Bool(b) => ParamValue::Bool(b),
                DefaultRule::RegistryName => {
                    let group = Self::required_str(values, names::RESOURCE_GROUP)?;
                    ParamValue::Str(derive_registry_name(group))
                }
                DefaultRule::EndpointSuffix => {
                    let cloud = Self::required_str(values, names::CLOUD)?;
                    ParamValue::Str(derive_endpoint_suffix(cloud))
                }
            };

            debug!("Defaulting '{}' to '{}'", optional.name, value);
            values.insert(optional.name.to_string(), value);
        }

        Ok(())
    }

    /// Reads an already-resolved string value during default derivation.
    fn required_str<'a>(
        values: &'a IndexMap<String, ParamValue>,
        name: &str,
    ) -> Result<&'a str> {
        match values.get(name) {
            Some(ParamValue::Str(s)) => Ok(s),
            Some(_) => Err(SkyliftError::Params(ParamsError::WrongType {
                name: name.to_string(),
                expected: "string",
            })),
            None => Err(SkyliftError::Params(ParamsError::missing(name))),
        }
    }
}

/// Derives a registry name from the resource group: lowercase
/// alphanumerics only (registry names reject punctuation), suffixed with
/// "acr".
fn derive_registry_name(resource_group: &str) -> String {
    let mut name: String = resource_group
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    name.push_str("acr");
    name
}

/// Derives the storage endpoint suffix from the cloud flavor.
fn derive_endpoint_suffix(cloud: &str) -> String {
    match cloud {
        "public" => String::from("core.windows.net"),
        "usgov" => String::from("core.usgovcloudapi.net"),
        "china" => String::from("core.chinacloudapi.cn"),
        other => format!("core.{other}.net"),
    }
}
