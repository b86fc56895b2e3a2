//! Provider selection from credential environment variables
//!
//! Precedence when selecting automatically: OpenAI, then Bedrock, then Azure.
//! An explicit choice skips the precedence and only checks that provider.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::sigv4::AwsCredentials;
use super::{AzureOpenAIClient, BedrockClient, LlmClient, OpenAIClient};
use crate::config::LlmConfig;
use crate::error::PlannerError;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const AZURE_OPENAI_KEY: &str = "AZURE_OPENAI_KEY";
pub const AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";

/// One of the supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Bedrock,
    Azure,
}

impl ProviderKind {
    /// Auto-selection order
    pub const PRECEDENCE: [ProviderKind; 3] = [ProviderKind::OpenAI, ProviderKind::Bedrock, ProviderKind::Azure];

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Bedrock => "bedrock",
            Self::Azure => "azure",
        }
    }

    /// Variables that must all be set for this provider
    pub fn credential_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAI => &[OPENAI_API_KEY],
            Self::Bedrock => &[AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY],
            Self::Azure => &[AZURE_OPENAI_KEY],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Provider choice from CLI or config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChoice {
    Auto,
    Fixed(ProviderKind),
}

impl FromStr for ProviderChoice {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "openai" => Ok(Self::Fixed(ProviderKind::OpenAI)),
            "bedrock" | "aws" => Ok(Self::Fixed(ProviderKind::Bedrock)),
            "azure" => Ok(Self::Fixed(ProviderKind::Azure)),
            other => Err(PlannerError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: auto, openai, bedrock, azure",
                other
            ))),
        }
    }
}

/// Credentials for exactly one provider
#[derive(Debug, Clone)]
pub enum Credentials {
    OpenAI { api_key: String },
    Bedrock(AwsCredentials),
    Azure { api_key: String },
}

impl Credentials {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAI { .. } => ProviderKind::OpenAI,
            Self::Bedrock(_) => ProviderKind::Bedrock,
            Self::Azure { .. } => ProviderKind::Azure,
        }
    }
}

/// Environment lookup; empty values count as unset
pub trait Env {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl<F> Env for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, name: &str) -> Option<String> {
        self(name).filter(|v| !v.is_empty())
    }
}

/// Pick a provider and collect its credentials
pub fn resolve_credentials(choice: ProviderChoice, env: &dyn Env) -> Result<Credentials, PlannerError> {
    debug!(?choice, "resolve_credentials: called");
    let candidates: Vec<ProviderKind> = match choice {
        ProviderChoice::Auto => ProviderKind::PRECEDENCE.to_vec(),
        ProviderChoice::Fixed(kind) => vec![kind],
    };

    for kind in &candidates {
        if let Some(creds) = credentials_for(*kind, env) {
            info!(provider = %kind, "Selected LLM provider");
            return Ok(creds);
        }
        debug!(provider = %kind, "resolve_credentials: credentials incomplete");
    }

    let vars = candidates
        .iter()
        .flat_map(|k| k.credential_vars().iter().map(|v| v.to_string()))
        .collect();
    Err(PlannerError::MissingCredentials { vars })
}

fn credentials_for(kind: ProviderKind, env: &dyn Env) -> Option<Credentials> {
    match kind {
        ProviderKind::OpenAI => env.var(OPENAI_API_KEY).map(|api_key| Credentials::OpenAI { api_key }),
        ProviderKind::Bedrock => {
            let access_key_id = env.var(AWS_ACCESS_KEY_ID)?;
            let secret_access_key = env.var(AWS_SECRET_ACCESS_KEY)?;
            Some(Credentials::Bedrock(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: env.var(AWS_SESSION_TOKEN),
            }))
        }
        ProviderKind::Azure => env.var(AZURE_OPENAI_KEY).map(|api_key| Credentials::Azure { api_key }),
    }
}

/// Build the client for resolved credentials
pub fn create_client(
    config: &LlmConfig,
    credentials: Credentials,
    env: &dyn Env,
) -> Result<Arc<dyn LlmClient>, PlannerError> {
    debug!(provider = %credentials.kind(), "create_client: called");
    let timeout = Duration::from_millis(config.timeout_ms);

    let client: Arc<dyn LlmClient> = match credentials {
        Credentials::OpenAI { api_key } => Arc::new(OpenAIClient::new(
            api_key,
            &config.openai,
            env.var(OPENAI_BASE_URL),
            config.max_tokens,
            timeout,
        )?),
        Credentials::Bedrock(aws) => {
            let region = env
                .var(AWS_REGION)
                .or_else(|| env.var(AWS_DEFAULT_REGION))
                .unwrap_or_else(|| config.bedrock.region.clone());
            Arc::new(BedrockClient::new(
                aws,
                config.bedrock.model.clone(),
                region,
                config.max_tokens,
                timeout,
            )?)
        }
        Credentials::Azure { api_key } => {
            let endpoint = env
                .var(AZURE_OPENAI_ENDPOINT)
                .or_else(|| config.azure.endpoint.clone())
                .ok_or_else(|| {
                    PlannerError::Config(format!(
                        "Azure OpenAI endpoint not set. export {}=https://<resource>.openai.azure.com or set llm.azure.endpoint",
                        AZURE_OPENAI_ENDPOINT
                    ))
                })?;
            Arc::new(AzureOpenAIClient::new(
                api_key,
                endpoint,
                &config.azure,
                config.max_tokens,
                timeout,
            )?)
        }
    };

    Ok(client)
}

/// Resolve credentials from the process environment and build the client
///
/// `provider_override` (from the CLI) wins over `llm.provider`.
pub fn connect(config: &LlmConfig, provider_override: Option<&str>) -> Result<Arc<dyn LlmClient>, PlannerError> {
    let choice: ProviderChoice = provider_override.unwrap_or(&config.provider).parse()?;
    let env = ProcessEnv;
    let credentials = resolve_credentials(choice, &env)?;
    create_client(config, credentials, &env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_openai_takes_precedence() {
        let env = env_of(&[
            (OPENAI_API_KEY, "sk-1"),
            (AWS_ACCESS_KEY_ID, "AKID"),
            (AWS_SECRET_ACCESS_KEY, "secret"),
            (AZURE_OPENAI_KEY, "az"),
        ]);
        let creds = resolve_credentials(ProviderChoice::Auto, &env).unwrap();
        assert_eq!(creds.kind(), ProviderKind::OpenAI);
    }

    #[test]
    fn test_bedrock_requires_both_aws_variables() {
        let env = env_of(&[(AWS_ACCESS_KEY_ID, "AKID"), (AZURE_OPENAI_KEY, "az")]);
        let creds = resolve_credentials(ProviderChoice::Auto, &env).unwrap();
        assert_eq!(creds.kind(), ProviderKind::Azure);

        let env = env_of(&[
            (AWS_ACCESS_KEY_ID, "AKID"),
            (AWS_SECRET_ACCESS_KEY, "secret"),
            (AWS_SESSION_TOKEN, "tok"),
            (AZURE_OPENAI_KEY, "az"),
        ]);
        match resolve_credentials(ProviderChoice::Auto, &env).unwrap() {
            Credentials::Bedrock(aws) => {
                assert_eq!(aws.access_key_id, "AKID");
                assert_eq!(aws.session_token.as_deref(), Some("tok"));
            }
            other => panic!("Expected Bedrock, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let env = env_of(&[(OPENAI_API_KEY, ""), (AZURE_OPENAI_KEY, "az")]);
        let creds = resolve_credentials(ProviderChoice::Auto, &env).unwrap();
        assert_eq!(creds.kind(), ProviderKind::Azure);
    }

    #[test]
    fn test_no_credentials_lists_every_variable() {
        let env = env_of(&[]);
        let err = resolve_credentials(ProviderChoice::Auto, &env).unwrap_err();
        match err {
            PlannerError::MissingCredentials { vars } => {
                assert_eq!(
                    vars,
                    vec![OPENAI_API_KEY, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AZURE_OPENAI_KEY]
                );
            }
            other => panic!("Expected MissingCredentials, got {}", other),
        }
    }

    #[test]
    fn test_explicit_choice_overrides_precedence() {
        let env = env_of(&[(OPENAI_API_KEY, "sk-1"), (AZURE_OPENAI_KEY, "az")]);
        let creds = resolve_credentials(ProviderChoice::Fixed(ProviderKind::Azure), &env).unwrap();
        assert_eq!(creds.kind(), ProviderKind::Azure);
    }

    #[test]
    fn test_explicit_choice_without_its_credentials_fails() {
        let env = env_of(&[(OPENAI_API_KEY, "sk-1")]);
        let err = resolve_credentials(ProviderChoice::Fixed(ProviderKind::Bedrock), &env).unwrap_err();
        match err {
            PlannerError::MissingCredentials { vars } => {
                assert_eq!(vars, vec![AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY]);
            }
            other => panic!("Expected MissingCredentials, got {}", other),
        }
    }

    #[test]
    fn test_provider_choice_parse() {
        assert_eq!("auto".parse::<ProviderChoice>().unwrap(), ProviderChoice::Auto);
        assert_eq!(
            "OpenAI".parse::<ProviderChoice>().unwrap(),
            ProviderChoice::Fixed(ProviderKind::OpenAI)
        );
        assert_eq!(
            "aws".parse::<ProviderChoice>().unwrap(),
            ProviderChoice::Fixed(ProviderKind::Bedrock)
        );
        assert!("vertex".parse::<ProviderChoice>().is_err());
    }

    #[test]
    fn test_create_client_per_provider() {
        let config = LlmConfig::default();
        let env = env_of(&[(AZURE_OPENAI_ENDPOINT, "https://example.openai.azure.com")]);

        let client = create_client(&config, Credentials::OpenAI { api_key: "k".to_string() }, &env).unwrap();
        assert_eq!(client.provider(), "openai");

        let client = create_client(&config, Credentials::Azure { api_key: "k".to_string() }, &env).unwrap();
        assert_eq!(client.provider(), "azure");

        let aws = AwsCredentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "s".to_string(),
            session_token: None,
        };
        let client = create_client(&config, Credentials::Bedrock(aws), &env).unwrap();
        assert_eq!(client.provider(), "bedrock");
    }

    #[test]
    fn test_azure_without_endpoint_is_config_error() {
        let config = LlmConfig::default();
        let env = env_of(&[]);
        let result = create_client(&config, Credentials::Azure { api_key: "k".to_string() }, &env);
        assert!(matches!(result, Err(PlannerError::Config(_))));
    }
}
