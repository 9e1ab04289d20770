//! Parameter and secret hydration: matching declared specs against the
//! values supplied on an envelope before any handler code runs.

use std::collections::HashMap;

use regex::Regex;

use crate::core::{
    AutomationError, CommandEnvelope, EventEnvelope, RegistrationConfirmation, Result,
};
use crate::registry::{CommandDescriptor, EventDescriptor, SecretSpec};

/// Secret paths that may fall back to ambient registration credentials when
/// no explicit value was supplied.
const AMBIENT_TOKEN_PATHS: &[&str] = &["github://user_token", "github://org_token"];

/// Hydrated command values: declared parameters and mapped parameters,
/// validated and keyed by name. Secrets travel on the execution context.
#[derive(Debug, Clone, Default)]
pub struct HydratedCommand {
    pub parameters: HashMap<String, String>,
    pub mapped_parameters: HashMap<String, String>,
}

impl HydratedCommand {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn mapped_parameter(&self, name: &str) -> Option<&str> {
        self.mapped_parameters.get(name).map(String::as_str)
    }
}

/// Match a command envelope against its descriptor. Returns the hydrated
/// values plus resolved secrets, or a `ParameterValidation` failure naming
/// the first offending declaration.
pub fn hydrate_command(
    descriptor: &CommandDescriptor,
    envelope: &CommandEnvelope,
    registration: Option<&RegistrationConfirmation>,
) -> Result<(HydratedCommand, HashMap<String, String>)> {
    let mut parameters = HashMap::new();
    for spec in &descriptor.parameters {
        let supplied = envelope
            .parameters
            .iter()
            .find(|p| p.name == spec.name)
            .map(|p| p.value.clone());

        match supplied {
            Some(value) => {
                if let Some(pattern) = &spec.pattern {
                    let regex = Regex::new(pattern).map_err(|e| {
                        AutomationError::ParameterValidation(format!(
                            "invalid pattern for parameter '{}' of '{}': {e}",
                            spec.name, descriptor.name
                        ))
                    })?;
                    if !regex.is_match(&value) {
                        return Err(AutomationError::ParameterValidation(format!(
                            "value of parameter '{}' does not match pattern '{}'",
                            spec.name, pattern
                        )));
                    }
                }
                parameters.insert(spec.name.clone(), value);
            }
            None if spec.required => {
                return Err(AutomationError::ParameterValidation(format!(
                    "required parameter '{}' missing for '{}'",
                    spec.name, descriptor.name
                )));
            }
            None => {}
        }
    }

    let mut mapped_parameters = HashMap::new();
    for spec in &descriptor.mapped_parameters {
        let supplied = envelope
            .mapped_parameters
            .iter()
            .find(|p| p.name == spec.local_key)
            .map(|p| p.value.clone());
        match supplied {
            Some(value) => {
                mapped_parameters.insert(spec.local_key.clone(), value);
            }
            None => {
                return Err(AutomationError::ParameterValidation(format!(
                    "mapped parameter '{}' missing for '{}'",
                    spec.local_key, descriptor.name
                )));
            }
        }
    }

    let secrets = hydrate_secrets(
        &descriptor.secrets,
        &envelope.secrets,
        registration,
        &descriptor.name,
    )?;

    Ok((
        HydratedCommand {
            parameters,
            mapped_parameters,
        },
        secrets,
    ))
}

/// Match an event envelope's secrets against its descriptor.
pub fn hydrate_event(
    descriptor: &EventDescriptor,
    envelope: &EventEnvelope,
    registration: Option<&RegistrationConfirmation>,
) -> Result<HashMap<String, String>> {
    hydrate_secrets(
        &descriptor.secrets,
        &envelope.secrets,
        registration,
        &descriptor.subscription_name,
    )
}

fn hydrate_secrets(
    specs: &[SecretSpec],
    supplied: &[crate::core::Secret],
    registration: Option<&RegistrationConfirmation>,
    handler_name: &str,
) -> Result<HashMap<String, String>> {
    let mut secrets = HashMap::new();
    for spec in specs {
        let value = supplied
            .iter()
            .find(|s| s.uri == spec.path)
            .map(|s| s.value.clone());
        match value {
            Some(value) => {
                secrets.insert(spec.name.clone(), value);
            }
            // Well-known token paths may resolve to the ambient registration
            // credentials instead of an explicit value.
            None if AMBIENT_TOKEN_PATHS.contains(&spec.path.as_str()) => {
                if let Some(registration) = registration {
                    secrets.insert(spec.name.clone(), registration.jwt.clone());
                } else {
                    return Err(AutomationError::ParameterValidation(format!(
                        "secret '{}' not supplied for '{handler_name}' and no ambient credentials available",
                        spec.path
                    )));
                }
            }
            None => {
                return Err(AutomationError::ParameterValidation(format!(
                    "secret '{}' not supplied for '{handler_name}'",
                    spec.path
                )));
            }
        }
    }
    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::core::HandlerResult;
    use crate::dispatch::context::ExecutionContext;
    use crate::registry::{CommandHandler, ParameterSpec};

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn handle(
            &self,
            _ctx: &ExecutionContext,
            _invocation: &HydratedCommand,
        ) -> Result<HandlerResult> {
            Ok(HandlerResult::success())
        }
    }

    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("HelloWorld", Arc::new(Noop))
            .with_parameter(ParameterSpec::required("name").with_pattern("^[a-z]+$"))
            .with_parameter(ParameterSpec::optional("greeting"))
    }

    #[test]
    fn missing_required_parameter_fails_validation() {
        let envelope = CommandEnvelope::new("HelloWorld", "T1");
        let err = hydrate_command(&descriptor(), &envelope, None).unwrap_err();
        assert!(matches!(err, AutomationError::ParameterValidation(_)));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn pattern_violation_fails_validation() {
        let envelope = CommandEnvelope::new("HelloWorld", "T1").with_parameter("name", "CD-42");
        let err = hydrate_command(&descriptor(), &envelope, None).unwrap_err();
        assert!(matches!(err, AutomationError::ParameterValidation(_)));
    }

    #[test]
    fn optional_parameters_may_be_absent() {
        let envelope = CommandEnvelope::new("HelloWorld", "T1").with_parameter("name", "cd");
        let (hydrated, _) = hydrate_command(&descriptor(), &envelope, None).unwrap();
        assert_eq!(hydrated.parameter("name"), Some("cd"));
        assert_eq!(hydrated.parameter("greeting"), None);
    }

    #[test]
    fn well_known_secret_falls_back_to_registration() {
        let descriptor = CommandDescriptor::new("HelloWorld", Arc::new(Noop))
            .with_secret("token", "github://user_token");
        let envelope = CommandEnvelope::new("HelloWorld", "T1");
        let registration = RegistrationConfirmation::new("ambient-jwt", "conn");

        let (_, secrets) = hydrate_command(&descriptor, &envelope, Some(&registration)).unwrap();
        assert_eq!(secrets.get("token").map(String::as_str), Some("ambient-jwt"));
    }

    #[test]
    fn unknown_secret_without_value_fails() {
        let descriptor = CommandDescriptor::new("HelloWorld", Arc::new(Noop))
            .with_secret("deploy", "vault://deploy_key");
        let envelope = CommandEnvelope::new("HelloWorld", "T1");
        let registration = RegistrationConfirmation::new("ambient-jwt", "conn");

        let err = hydrate_command(&descriptor, &envelope, Some(&registration)).unwrap_err();
        assert!(matches!(err, AutomationError::ParameterValidation(_)));
    }
}
