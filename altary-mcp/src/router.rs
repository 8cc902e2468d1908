//! Tool dispatch: typed arguments in, rendered text out.

use std::sync::Arc;

use altary_auth::AuthFlow;
use altary_client::RemoteClient;
use altary_session::SessionStore;
use altary_types::AltaryError;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::render;

/// Tool names, in the order they are advertised.
pub const TOOL_NAMES: [&str; 7] = [
    "get_user_projects",
    "get_errors",
    "complete_error",
    "setup_auth",
    "set_default_project",
    "show_config",
    "clear_config",
];

/// Definition of a tool as advertised to the host.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// The tool name (unique identifier).
    pub name: &'static str,
    /// Description of what the tool does.
    pub description: &'static str,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: serde_json::Value,
}

/// Text result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    /// Rendered text for the assistant.
    pub text: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolReply {
    fn ok(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    fn error(text: String) -> Self {
        Self {
            text,
            is_error: true,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct NoArgs {}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetErrorsArgs {
    /// Project ID. The default project is used when omitted.
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CompleteErrorArgs {
    /// ID of the error to complete.
    error_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetupAuthArgs {
    /// Authentication token. Opens a browser sign-in when omitted.
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetDefaultProjectArgs {
    /// ID of the project to use by default.
    project_id: String,
}

fn schema<T: schemars::JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// The seven Altary tools with their input schemas.
pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_user_projects",
            description: "List the Altary projects of the authenticated user.",
            input_schema: schema::<NoArgs>(),
        },
        ToolSpec {
            name: "get_errors",
            description: "List the open errors of a project.",
            input_schema: schema::<GetErrorsArgs>(),
        },
        ToolSpec {
            name: "complete_error",
            description: "Mark an error as completed. Similar errors are completed with it.",
            input_schema: schema::<CompleteErrorArgs>(),
        },
        ToolSpec {
            name: "setup_auth",
            description: "Authenticate with Altary, with a token or through the browser.",
            input_schema: schema::<SetupAuthArgs>(),
        },
        ToolSpec {
            name: "set_default_project",
            description: "Set the project used when no project ID is given.",
            input_schema: schema::<SetDefaultProjectArgs>(),
        },
        ToolSpec {
            name: "show_config",
            description: "Show the current configuration.",
            input_schema: schema::<NoArgs>(),
        },
        ToolSpec {
            name: "clear_config",
            description: "Clear the saved token and default project.",
            input_schema: schema::<NoArgs>(),
        },
    ]
}

/// Routes tool calls to the store, the client and the auth flow.
#[derive(Debug)]
pub struct Router {
    store: Arc<SessionStore>,
    client: RemoteClient,
    auth: AuthFlow,
}

impl Router {
    /// Create a router. The store is taken from `client`.
    pub fn new(client: RemoteClient, auth: AuthFlow) -> Self {
        Self {
            store: Arc::clone(client.store()),
            client,
            auth,
        }
    }

    /// Run the tool `name` with JSON `arguments`.
    ///
    /// Never fails: unknown tools, bad arguments and Altary errors all become
    /// error replies.
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> ToolReply {
        tracing::debug!(tool = name, "dispatching tool call");
        let result = match name {
            "get_user_projects" => match parse::<NoArgs>(name, arguments) {
                Ok(_) => self.get_user_projects().await,
                Err(reply) => return reply,
            },
            "get_errors" => match parse::<GetErrorsArgs>(name, arguments) {
                Ok(args) => self.get_errors(args).await,
                Err(reply) => return reply,
            },
            "complete_error" => match parse::<CompleteErrorArgs>(name, arguments) {
                Ok(args) => self.complete_error(args).await,
                Err(reply) => return reply,
            },
            "setup_auth" => match parse::<SetupAuthArgs>(name, arguments) {
                Ok(args) => self.setup_auth(args).await,
                Err(reply) => return reply,
            },
            "set_default_project" => match parse::<SetDefaultProjectArgs>(name, arguments) {
                Ok(args) => self.set_default_project(args).await,
                Err(reply) => return reply,
            },
            "show_config" => match parse::<NoArgs>(name, arguments) {
                Ok(_) => self.show_config().await,
                Err(reply) => return reply,
            },
            "clear_config" => match parse::<NoArgs>(name, arguments) {
                Ok(_) => self.clear_config().await,
                Err(reply) => return reply,
            },
            _ => {
                tracing::warn!(tool = name, "unknown tool");
                return ToolReply::error(format!("Unknown tool: {name}"));
            }
        };

        match result {
            Ok(reply) => reply,
            Err(err) => {
                tracing::info!(tool = name, kind = ?err.kind(), error = %err, "tool call failed");
                let base_url = self.store.load().await.api_base_url;
                ToolReply::error(render::error(&err, &base_url))
            }
        }
    }

    async fn get_user_projects(&self) -> Result<ToolReply, AltaryError> {
        let projects = self.client.list_projects().await?;
        let session = self.store.load().await;
        Ok(ToolReply::ok(render::projects(
            &projects,
            session.default_project_id.as_deref(),
        )))
    }

    async fn get_errors(&self, args: GetErrorsArgs) -> Result<ToolReply, AltaryError> {
        let explicit = args.project_id.filter(|id| !id.trim().is_empty());
        let errors = self.client.list_errors(explicit.as_deref()).await?;
        let project_id = match explicit {
            Some(id) => id,
            None => self
                .store
                .load()
                .await
                .default_project_id
                .unwrap_or_default(),
        };
        Ok(ToolReply::ok(render::errors(&project_id, &errors)))
    }

    async fn complete_error(&self, args: CompleteErrorArgs) -> Result<ToolReply, AltaryError> {
        let outcome = self.client.complete_error(args.error_id.trim()).await?;
        Ok(ToolReply::ok(render::completion(&outcome)))
    }

    async fn setup_auth(&self, args: SetupAuthArgs) -> Result<ToolReply, AltaryError> {
        let report = match args.token.filter(|t| !t.trim().is_empty()) {
            Some(token) => self.auth.authenticate_with_token(&token).await?,
            None => self.auth.authenticate_interactive().await?,
        };
        let text = render::auth_report(&report);
        Ok(if report.succeeded() {
            ToolReply::ok(text)
        } else {
            ToolReply::error(text)
        })
    }

    async fn set_default_project(
        &self,
        args: SetDefaultProjectArgs,
    ) -> Result<ToolReply, AltaryError> {
        let project_id = args.project_id.trim();
        if project_id.is_empty() {
            return Err(AltaryError::InvalidInput(
                "project id must not be empty".into(),
            ));
        }

        let projects = self.client.list_projects().await?;
        let Some(project) = projects.iter().find(|p| p.id == project_id).cloned() else {
            return Ok(ToolReply::error(render::unknown_project(
                project_id, &projects,
            )));
        };
        self.store.set_default_project(&project.id).await?;
        tracing::info!(project_id = %project.id, "default project set");
        Ok(ToolReply::ok(render::default_project_set(&project)))
    }

    async fn show_config(&self) -> Result<ToolReply, AltaryError> {
        let session = self.store.load().await;
        Ok(ToolReply::ok(render::config(&session, self.store.path())))
    }

    async fn clear_config(&self) -> Result<ToolReply, AltaryError> {
        self.store.clear().await?;
        Ok(ToolReply::ok(render::cleared()))
    }
}

/// Deserialize tool arguments; a missing or `null` argument object counts as
/// empty.
fn parse<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> Result<T, ToolReply> {
    let arguments = if arguments.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| ToolReply::error(format!("Invalid arguments for `{tool}`: {e}")))
}
